#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    cfdi_invoice_server::run().await
}
