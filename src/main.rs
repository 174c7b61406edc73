mod api;
mod book;
mod cli;
mod config;
mod export;
mod invoice;
mod ledger;

use api::{HttpInvoiceApi, InvoiceApi, PageQuery};
use book::{BookError, InvoiceBook};
use clap::Parser;
use cli::{Cli, Commands, CustomerArgs, ItemSpec, SetItem};
use config::Config;
use invoice::{InvoiceDraft, PersistedInvoice};
use ledger::{format_money, format_money_grouped};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        println!("✗ Error: {e}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::load_or_default(&cli.config)?;

    // Ctrl-C aborts whatever request is in flight.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    let api = HttpInvoiceApi::new(&cfg.api, cancel)?;
    info!(base_url = %cfg.api.base_url, "Using invoice API");

    match cli.command {
        Commands::List { page, limit, expand } => list(&api, PageQuery { page, limit }, expand).await,
        Commands::Show { id } => show(&api, id).await,
        Commands::Create { customer, yes, items } => create(&api, customer, &items, yes).await,
        Commands::Edit {
            id,
            customer,
            set_items,
            add_items,
            remove_items,
        } => edit(&api, id, customer, &set_items, &add_items, &remove_items).await,
        Commands::Delete { id, yes } => delete(&api, id, yes).await,
        Commands::Export { id, strategy, out } => {
            export(&api, &cfg, id, strategy.unwrap_or(cfg.export.strategy), out).await
        }
    }
}

async fn list(api: &dyn InvoiceApi, query: PageQuery, expand: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut book = InvoiceBook::new(api, query);
    info!("Loading invoices...");
    book.reload().await?;

    if book.invoices().is_empty() {
        println!("No invoices found.");
        return Ok(());
    }

    println!(
        "{:>5}  {:<14} {:<24} {:<12} {:<8} {:>14}",
        "ID", "Number", "Customer", "Date", "Status", "Total"
    );
    for inv in book.invoices() {
        println!(
            "{:>5}  {:<14} {:<24} {:<12} {:<8} {:>14}",
            inv.id,
            inv.invoice_number,
            truncate(&inv.customer_name, 24),
            inv.invoice_date,
            inv.status,
            format_money_grouped(inv.total_amount)
        );
        if expand {
            for item in &inv.items {
                println!(
                    "       - {} {} x {} = {}",
                    item.name,
                    item.quantity,
                    format_money(item.unit_price),
                    format_money(item.amount())
                );
            }
        }
    }
    println!(
        "\nPage {} of {} ({} invoices)",
        query.page.unwrap_or(1),
        book.total_pages().max(1),
        book.total_items()
    );
    Ok(())
}

async fn show(api: &dyn InvoiceApi, id: i64) -> Result<(), Box<dyn std::error::Error>> {
    info!(id, "Loading invoice...");
    let inv = api.get(id).await?;
    let computed = inv.ledger().subtotal();
    if (computed - inv.subtotal).abs() > 0.005 {
        warn!(id, stored = inv.subtotal, computed, "Stored subtotal does not match line items");
    }
    print_invoice(&inv);
    Ok(())
}

fn print_invoice(inv: &PersistedInvoice) {
    println!("Invoice {} (id {})", inv.invoice_number, inv.id);
    println!("  Status:   {}", inv.status);
    println!("  Date:     {}", inv.invoice_date);
    println!("  Due:      {}", inv.due_date.as_deref().unwrap_or("N/A"));
    println!("  Created:  {}", inv.created_at_display());
    println!("\nBilled to:");
    for field in [&inv.customer_name, &inv.customer_phone, &inv.customer_address] {
        if !field.is_empty() {
            println!("  {field}");
        }
    }

    println!("\n{:>3}  {:<28} {:<6} {:>8} {:>12} {:>12}", "#", "Item", "Unit", "Qty", "Unit Price", "Total");
    for (i, item) in inv.items.iter().enumerate() {
        println!(
            "{:>3}  {:<28} {:<6} {:>8} {:>12} {:>12}",
            i,
            truncate(&item.name, 28),
            item.unit.as_deref().unwrap_or(""),
            item.quantity,
            format_money(item.unit_price),
            format_money(item.amount())
        );
        if let Some(desc) = item.description.as_deref().filter(|d| !d.is_empty()) {
            println!("       {desc}");
        }
    }

    println!("\n{:>60} {:>12}", "Subtotal:", format_money(inv.subtotal));
    println!("{:>60} {:>12}", "Discount:", format_money(inv.discount));
    println!("{:>60} {:>12}", "Total:", format_money(inv.total_amount));
    if !inv.notes.trim().is_empty() {
        println!("\nNotes:\n  {}", inv.notes);
    }
}

async fn create(
    api: &dyn InvoiceApi,
    customer: CustomerArgs,
    items: &[ItemSpec],
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut draft = InvoiceDraft::new();
    customer.apply(&mut draft);
    cli::fill_new_items(&mut draft, items)?;
    let payload = draft.to_payload()?;

    println!(
        "{} item(s), subtotal {}, total {}",
        draft.ledger.len(),
        format_money(draft.subtotal()),
        format_money(draft.total())
    );
    if !yes && !confirm("Create Invoice?")? {
        println!("Cancelled.");
        return Ok(());
    }

    info!(items = payload.items.len(), total = draft.total(), "Saving invoice...");
    match api.create(&payload).await? {
        Some(id) => println!("✓ Invoice created (id {id}), total {}", format_money(draft.total())),
        None => println!("✓ Invoice created, total {}", format_money(draft.total())),
    }
    Ok(())
}

async fn edit(
    api: &dyn InvoiceApi,
    id: i64,
    customer: CustomerArgs,
    set_items: &[SetItem],
    add_items: &[ItemSpec],
    remove_items: &[usize],
) -> Result<(), Box<dyn std::error::Error>> {
    info!(id, "Loading invoice...");
    let current = api.get(id).await?;

    let mut draft = InvoiceDraft::from_persisted(&current);
    customer.apply(&mut draft);
    cli::apply_item_edits(&mut draft, set_items, add_items, remove_items)?;
    let payload = draft.to_payload()?;

    info!(id, items = draft.ledger.len(), total = draft.total(), "Updating invoice...");
    api.update(id, &payload).await?;
    println!(
        "✓ Invoice {} updated: subtotal {}, total {}",
        current.invoice_number,
        format_money(draft.subtotal()),
        format_money(draft.total())
    );
    Ok(())
}

async fn delete(api: &dyn InvoiceApi, id: i64, yes: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !yes && !confirm("Do you really want to delete this invoice?")? {
        println!("Cancelled.");
        return Ok(());
    }

    let mut book = InvoiceBook::new(api, PageQuery::default());
    info!("Loading invoices...");
    book.reload().await?;

    match book.delete(id).await {
        Ok(removed) => println!("✓ Deleted invoice {}", removed.invoice_number),
        // Not on the first page: delete it without the local list.
        Err(BookError::NotFound(_)) => {
            api.delete(id).await?;
            println!("✓ Deleted invoice {id}");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn export(
    api: &dyn InvoiceApi,
    cfg: &Config,
    id: i64,
    strategy: config::ExportStrategy,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let span = info_span!("export_invoice", id);
    async {
        info!("Loading invoice...");
        let inv = api.get(id).await?;

        let exporter = export::exporter_for(&cfg.export, &cfg.branding, strategy);
        info!(strategy = exporter.name(), "Rendering PDF...");
        let doc = export::export_invoice(exporter, inv).await?;

        let dir = out.unwrap_or_else(|| cfg.export.output_dir.clone());
        let path = export::write_document(&doc, &dir)?;
        println!("✓ Saved {} ({} page{})", path.display(), doc.pages, if doc.pages == 1 { "" } else { "s" });
        Ok::<(), Box<dyn std::error::Error>>(())
    }
    .instrument(span)
    .await
}

fn confirm(question: &str) -> std::io::Result<bool> {
    cli::confirm(question, &mut std::io::stdin().lock(), &mut std::io::stdout())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
