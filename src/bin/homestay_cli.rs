use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
    str::FromStr,
};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use homestay_payments::{
    openapi,
    services::{
        menu::MenuCatalog,
        pricing::{
            AddOnSelection, PriceBreakdown, PricingCalculator, StayWindow, DEFAULT_ROOM_PRICE_PER_NIGHT,
            DEFAULT_TAX_RATE,
        },
        signature::{checkout_signature, webhook_signature},
    },
};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "homestay",
    about = "Operator tools for the homestay payment service",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Price a stay the way the server does
    Quote(QuoteArgs),
    /// List the add-on menu with prices
    Menu,
    /// Produce the signature the checkout callback carries
    SignCheckout(SignCheckoutArgs),
    /// Produce the x-razorpay-signature header for a webhook body
    SignWebhook(SignWebhookArgs),
    /// Print the OpenAPI document
    Openapi,
}

#[derive(Args)]
struct QuoteArgs {
    /// Check-in date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    check_in: String,
    /// Check-out date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    check_out: String,
    /// Add-on as `id=quantity`; repeatable
    #[arg(long = "item", value_parser = parse_selection)]
    items: Vec<AddOnSelection>,
    /// Nightly room rate in rupees
    #[arg(long)]
    room_price: Option<Decimal>,
    /// Tax rate, e.g. 0.18
    #[arg(long)]
    tax_rate: Option<Decimal>,
}

#[derive(Args)]
struct SignCheckoutArgs {
    #[arg(long)]
    order_id: String,
    #[arg(long)]
    payment_id: String,
    /// Key secret; falls back to RAZORPAY_KEY_SECRET
    #[arg(long, env = "RAZORPAY_KEY_SECRET", hide_env_values = true)]
    secret: String,
}

#[derive(Args)]
struct SignWebhookArgs {
    /// Body file; reads stdin when omitted
    #[arg(long)]
    file: Option<PathBuf>,
    /// Webhook secret; falls back to RAZORPAY_WEBHOOK_SECRET
    #[arg(long, env = "RAZORPAY_WEBHOOK_SECRET", hide_env_values = true)]
    secret: String,
}

#[derive(Serialize)]
struct SignatureOutput<'a> {
    signature: &'a str,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Quote(args) => handle_quote(args, cli.json)?,
        Commands::Menu => handle_menu(cli.json)?,
        Commands::SignCheckout(args) => {
            let signature = checkout_signature(&args.secret, &args.order_id, &args.payment_id)
                .map_err(|e| anyhow!("failed to sign checkout callback: {e}"))?;
            render_signature(&signature, cli.json)?;
        }
        Commands::SignWebhook(args) => {
            let body = read_body(args.file.as_ref())?;
            let signature = webhook_signature(&args.secret, &body)
                .map_err(|e| anyhow!("failed to sign webhook body: {e}"))?;
            render_signature(&signature, cli.json)?;
        }
        Commands::Openapi => println!("{}", openapi::openapi_json()),
    }

    Ok(())
}

fn parse_selection(raw: &str) -> Result<AddOnSelection, String> {
    let (id, quantity) = raw
        .split_once('=')
        .map(|(id, qty)| (id.trim(), qty.trim()))
        .unwrap_or((raw.trim(), "1"));
    if id.is_empty() {
        return Err("item id is empty".to_string());
    }
    let quantity = u32::from_str(quantity).map_err(|_| format!("invalid quantity '{quantity}'"))?;
    Ok(AddOnSelection::new(id, quantity))
}

fn handle_quote(args: QuoteArgs, json: bool) -> Result<()> {
    let stay = StayWindow::parse(&args.check_in, &args.check_out)
        .map_err(|e| anyhow!("invalid stay: {e}"))?;
    let calculator = PricingCalculator::new(
        args.room_price.unwrap_or(DEFAULT_ROOM_PRICE_PER_NIGHT),
        args.tax_rate.unwrap_or(DEFAULT_TAX_RATE),
        MenuCatalog::standard(),
    );
    let quote = calculator
        .quote(&stay, &args.items)
        .map_err(|e| anyhow!("failed to price stay: {e}"))?;

    if json {
        print_json(&quote)?;
    } else {
        render_quote(&quote)?;
    }
    Ok(())
}

fn handle_menu(json: bool) -> Result<()> {
    let catalog = MenuCatalog::standard();
    if json {
        return print_json(&catalog.items());
    }
    for item in catalog.items() {
        println!(
            "- {:<28} {:<20} ₹{:>6}  [{}]",
            item.name,
            item.category.display_name(),
            item.price,
            item.id
        );
    }
    Ok(())
}

fn read_body(file: Option<&PathBuf>) -> Result<Vec<u8>> {
    match file {
        Some(path) => {
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))
        }
        None => {
            let mut body = Vec::new();
            io::stdin()
                .read_to_end(&mut body)
                .context("failed to read body from stdin")?;
            Ok(body)
        }
    }
}

fn render_signature(signature: &str, json: bool) -> Result<()> {
    if json {
        print_json(&SignatureOutput { signature })
    } else {
        println!("{signature}");
        Ok(())
    }
}

fn render_quote(quote: &PriceBreakdown) -> Result<()> {
    println!("Nights:          {}", quote.nights);
    println!("Room subtotal:   ₹{}", quote.room_subtotal);
    for line in &quote.line_items {
        println!(
            "  + {} x{} @ ₹{}",
            line.item_id, line.quantity, line.unit_price
        );
    }
    println!("Add-on subtotal: ₹{}", quote.add_on_subtotal);
    println!("Tax:             ₹{}", quote.tax);
    println!("Total:           ₹{}", quote.total);
    let paisa = quote
        .total_minor_units()
        .map_err(|e| anyhow!("total out of range: {e}"))?;
    println!("Charged (paisa): {paisa}");
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
