//! Smallest useful server: two JSON routes, no public path.
//!
//! ```bash
//! cargo run --example minimal
//! curl http://localhost:8080/hello?name=you
//! ```

use std::rc::Rc;

use minihttpd::params::{Param, Trim};
use minihttpd::renderer::Json;
use minihttpd::{ApplicationContext, Data, Error, Request, Routes, Server};
use serde_json::{Value, json};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    minihttpd::logger::init("info")?;

    let routes = Routes::new()
        .on("/", |_req| async { Data("minihttpd") })
        .on("/hello", hello);

    let app = ApplicationContext::builder()
        .routes(routes)
        .default_renderer(Rc::new(Json))
        .build()?;

    Server::bind("127.0.0.1:8080")?.serve(minihttpd::default_stack(app)?).await
}

async fn hello(req: Request) -> Result<Data<Value>, Error> {
    let name = Param::new("name").default("world").filter(Trim).from_query(&req)?;
    Ok(Data(json!({ "greeting": format!("Hello, {}!", name.as_str().unwrap_or("world")) })))
}
