// src/export/mod.rs

mod direct;
mod fonts;
mod pdf;
mod raster;
mod sheet;
mod snapshot;

pub use direct::DirectExporter;
pub use snapshot::SnapshotExporter;

use crate::config::{Branding, ExportConfig, ExportStrategy};
use crate::invoice::PersistedInvoice;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, info_span};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("font error: {0}")]
    Font(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("export task failed: {0}")]
    Task(String),
}

/// A rendered invoice, ready to be written out.
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub pages: usize,
}

pub trait DocumentExporter: Send + Sync {
    fn name(&self) -> &'static str;

    fn export(&self, invoice: &PersistedInvoice) -> Result<ExportedDocument, ExportError>;
}

/// `Invoice-<number>.pdf` with anything outside `[A-Za-z0-9._-]` replaced by `_`.
pub fn document_file_name(invoice_number: &str) -> String {
    let safe: String = invoice_number
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("Invoice-{safe}.pdf")
}

pub fn exporter_for(
    cfg: &ExportConfig,
    branding: &Branding,
    strategy: ExportStrategy,
) -> Box<dyn DocumentExporter> {
    match strategy {
        ExportStrategy::Snapshot => Box::new(SnapshotExporter::new(cfg, branding.clone())),
        ExportStrategy::Direct => Box::new(DirectExporter::new(cfg.page_format)),
    }
}

/// Run an exporter on the blocking pool; rasterizing a sheet is CPU bound.
pub async fn export_invoice(
    exporter: Box<dyn DocumentExporter>,
    invoice: PersistedInvoice,
) -> Result<ExportedDocument, ExportError> {
    tokio::task::spawn_blocking(move || {
        let _span = info_span!("export", invoice_no = %invoice.invoice_number, strategy = exporter.name())
            .entered();
        let doc = exporter.export(&invoice)?;
        info!(pages = doc.pages, bytes = doc.bytes.len(), "Invoice rendered");
        Ok(doc)
    })
    .await
    .map_err(|e| ExportError::Task(e.to_string()))?
}

pub fn write_document(doc: &ExportedDocument, dir: &Path) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(&doc.file_name);
    std::fs::write(&path, &doc.bytes)?;
    info!(path = %path.display(), "Saved PDF");
    Ok(path)
}
