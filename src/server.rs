//! HTTP routes for browsing and downloading the bundled sample CSV files.
//!
//! - `GET /api/sample-csv` lists the files as `{"files": [{filename, downloadPath}]}`.
//! - `GET /api/sample-csv/{filename}` streams one file back as an attachment. Any
//!   failure, including a name that escapes the sample directory, answers `404` with
//!   a fixed body so nothing about the filesystem leaks.
//! - `GET /healthz` and `GET /readyz` are liveness probes.

use std::path::PathBuf;

use actix_web::{
    App, HttpResponse, HttpServer, Responder,
    http::header,
    middleware::Logger,
    web::{self, Data},
};
use log::{debug, error, info};
use serde_json::json;

use crate::samples::{SAMPLE_ROUTE, SampleDirectory, encode_component};

/// Directory the sample routes serve from. It is opened per request, so the server
/// starts even when the directory does not exist yet.
#[derive(Debug, Clone)]
pub struct SampleRoot(pub PathBuf);

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope(SAMPLE_ROUTE)
            .route("", web::get().to(list_samples))
            .route("/{filename:.*}", web::get().to(download_sample)),
    )
    .route("/healthz", web::get().to(|| async { "ok" }))
    .route("/readyz", web::get().to(|| async { "ready" }));
}

async fn list_samples(root: Data<SampleRoot>) -> impl Responder {
    let listed = web::block(move || SampleDirectory::open(&root.0)?.listings()).await;
    match listed {
        Ok(Ok(files)) => HttpResponse::Ok().json(json!({ "files": files })),
        Ok(Err(err)) => {
            error!("Listing sample files failed: {err:#}");
            HttpResponse::InternalServerError().json(json!({ "error": err.to_string() }))
        }
        Err(err) => {
            error!("Listing sample files failed: {err}");
            HttpResponse::InternalServerError()
                .json(json!({ "error": "Failed to load sample CSVs" }))
        }
    }
}

async fn download_sample(root: Data<SampleRoot>, filename: web::Path<String>) -> impl Responder {
    let requested = filename.into_inner();
    let lookup = requested.clone();
    let read = web::block(move || {
        let samples = SampleDirectory::open(&root.0).map_err(|err| err.to_string())?;
        samples.read(&lookup).map_err(|err| err.to_string())
    })
    .await;

    match read {
        Ok(Ok((base_name, bytes))) => {
            debug!("Serving sample {base_name:?} ({} bytes)", bytes.len());
            HttpResponse::Ok()
                .content_type("text/csv; charset=utf-8")
                .insert_header((
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", encode_component(&base_name)),
                ))
                .body(bytes)
        }
        Ok(Err(reason)) => {
            debug!("Sample request {requested:?} failed: {reason}");
            not_found()
        }
        Err(err) => {
            error!("Sample request {requested:?} failed: {err}");
            not_found()
        }
    }
}

fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "error": "File not found" }))
}

pub async fn run(host: &str, port: u16, root: SampleRoot) -> std::io::Result<()> {
    info!(
        "Serving sample files from {:?} at http://{}:{}",
        root.0, host, port
    );
    let root = Data::new(root);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(root.clone())
            .configure(configure)
    })
    .bind((host, port))?
    .run()
    .await
}
