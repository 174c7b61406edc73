// src/book.rs

use crate::api::{ApiError, InvoiceApi, PageQuery};
use crate::invoice::PersistedInvoice;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum BookError {
    #[error("invoice {0} is not in the current list")]
    NotFound(i64),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// The invoice list session: the locally held page of invoices and the
/// operations the list screen performs on it.
pub struct InvoiceBook<'a> {
    api: &'a dyn InvoiceApi,
    query: PageQuery,
    invoices: Vec<PersistedInvoice>,
    total_pages: u32,
    total_items: u64,
}

impl<'a> InvoiceBook<'a> {
    pub fn new(api: &'a dyn InvoiceApi, query: PageQuery) -> Self {
        Self {
            api,
            query,
            invoices: Vec::new(),
            total_pages: 0,
            total_items: 0,
        }
    }

    pub fn invoices(&self) -> &[PersistedInvoice] {
        &self.invoices
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn total_items(&self) -> u64 {
        self.total_items
    }

    /// Fetch the current page. On failure the previously loaded list is kept.
    pub async fn reload(&mut self) -> Result<(), ApiError> {
        let page = self.api.list(self.query).await?;
        self.total_pages = page.total_pages;
        self.total_items = page.total_items;
        self.invoices = page.data;
        Ok(())
    }

    /// Delete an invoice. The row leaves the local list right away and is put
    /// back at its old position if the server refuses the delete.
    pub async fn delete(&mut self, id: i64) -> Result<PersistedInvoice, BookError> {
        let position = self
            .invoices
            .iter()
            .position(|inv| inv.id == id)
            .ok_or(BookError::NotFound(id))?;
        let removed = self.invoices.remove(position);

        match self.api.delete(id).await {
            Ok(()) => {
                self.total_items = self.total_items.saturating_sub(1);
                info!(id, invoice_no = %removed.invoice_number, "Invoice deleted");
                Ok(removed)
            }
            Err(e) => {
                warn!(id, error = %e, "Delete failed, restoring invoice to the list");
                self.invoices.insert(position, removed);
                Err(BookError::Api(e))
            }
        }
    }
}
