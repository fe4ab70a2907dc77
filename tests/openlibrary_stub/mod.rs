use std::collections::HashMap;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::Value;

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum StubReply {
    Docs(Vec<Value>),
    Status(u16),
    Body(&'static str),
}

pub struct OpenLibraryStub {
    pub base_url: String,
    requests: Arc<Mutex<Vec<HashMap<String, String>>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl OpenLibraryStub {
    pub fn spawn<F>(reply: F) -> Self
    where
        F: Fn(&HashMap<String, String>) -> StubReply + Send + 'static,
    {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start open library stub");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let url = url::Url::parse(&format!("http://stub{}", request.url()))
                    .expect("parse stub request url");
                if request.method() != &tiny_http::Method::Get || url.path() != "/search.json" {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                }

                let params = url.query_pairs().into_owned().collect::<HashMap<_, _>>();
                seen.lock().unwrap().push(params.clone());

                let response = match reply(&params) {
                    StubReply::Docs(docs) => {
                        let num_found = docs.len();
                        let body = serde_json::json!({
                            "numFound": num_found,
                            "start": 0,
                            "docs": docs,
                        });
                        let header = tiny_http::Header::from_bytes(
                            &b"Content-Type"[..],
                            &b"application/json"[..],
                        )
                        .expect("build header");
                        tiny_http::Response::from_string(body.to_string())
                            .with_status_code(200)
                            .with_header(header)
                    }
                    StubReply::Status(status) => {
                        tiny_http::Response::from_string("upstream unavailable")
                            .with_status_code(status)
                    }
                    StubReply::Body(body) => {
                        tiny_http::Response::from_string(body).with_status_code(200)
                    }
                };
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn search_url(&self) -> String {
        format!("{}/search.json", self.base_url)
    }

    pub fn requests(&self) -> Vec<HashMap<String, String>> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for OpenLibraryStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[allow(dead_code)]
pub fn doc(key: &str, title: &str, author: &str, year: i32, languages: &[&str]) -> Value {
    serde_json::json!({
        "key": key,
        "title": title,
        "author_name": [author],
        "first_publish_year": year,
        "language": languages,
        "cover_i": 1000 + year,
    })
}

#[allow(dead_code)]
pub fn dune_docs() -> Vec<Value> {
    vec![
        doc("/works/OL893415W", "Dune", "Frank Herbert", 1965, &["eng", "fre"]),
        doc("/works/OL893502W", "Dune Messiah", "Frank Herbert", 1969, &["eng"]),
        doc("/works/OL893526W", "Children of Dune", "Frank Herbert", 1976, &["eng"]),
    ]
}
