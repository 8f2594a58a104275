//! Full-featured server: a JSON task API, a templated HTML page and static
//! files.
//!
//! ```bash
//! RUST_LOG=debug cargo run --example tasks
//! # then open http://localhost:8080
//! ```

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use minihttpd::params::{NotEmpty, Param, Trim};
use minihttpd::renderer::{Html, Json, Renderer};
use minihttpd::{ApplicationContext, Data, Error, HttpError, Request, Route, Routes, Server};
use serde_json::{Value, json};

/// In-memory task list, shared by the API handlers.
type Tasks = Rc<RefCell<Vec<String>>>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    minihttpd::logger::init("debug")?;

    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos");
    let tasks: Tasks = Rc::new(RefCell::new(vec!["task1".to_owned(), "task2".to_owned()]));
    let html: Rc<dyn Renderer> = Rc::new(Html::new().with_layout(root.join("pages/layout.html")));

    let routes = Routes::new()
        .on("/", |_req| async { Err::<Data<()>, _>(HttpError::redirect("/demo")) })
        .on("/api/task/get", list(&tasks))
        .on("/api/task/add", add(&tasks, Duration::ZERO))
        .on("/api/task/add-async", add(&tasks, Duration::from_secs(2)))
        // pages/demo.html, with pages/demo.js and pages/demo.css inlined
        .route("/demo", Route::new(demo).with_renderer(html).with_view("pages/demo"));

    let app = ApplicationContext::builder()
        .routes(routes)
        .root_path(&root)
        .public_path(root.join("public"))
        .default_renderer(Rc::new(Json))
        .build()?;

    let pipeline = minihttpd::default_stack(app)?;
    Server::bind("127.0.0.1:8080")?.serve(pipeline).await
}

fn list(tasks: &Tasks) -> impl Fn(Request) -> std::future::Ready<Data<Vec<String>>> + 'static {
    let tasks = Rc::clone(tasks);
    move |_req| std::future::ready(Data(tasks.borrow().clone()))
}

/// Appends the `task` body parameter, answering after `delay`.
fn add(
    tasks: &Tasks,
    delay: Duration,
) -> impl Fn(Request) -> std::pin::Pin<Box<dyn Future<Output = Result<Data<Vec<String>>, Error>>>> + 'static
{
    let tasks = Rc::clone(tasks);
    move |req| {
        let tasks = Rc::clone(&tasks);
        Box::pin(async move {
            let task = Param::new("task").filter(Trim).validator(NotEmpty).from_body(&req)?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let task = match task {
                Value::String(s) => s,
                other => other.to_string(),
            };
            tasks.borrow_mut().push(task);
            Ok(Data(tasks.borrow().clone()))
        })
    }
}

async fn demo(req: Request) -> Data<Value> {
    req.context().with_render_options(|options| {
        options.insert("headCss".into(), json!(["/app.css"]));
        options.insert("bottomScripts".into(), json!(["/app.js"]));
    });
    Data(json!({ "title": "Mini HTTPD demo" }))
}
