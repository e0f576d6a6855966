use anyhow::{Context, Result};
use log::info;
use mongodb::bson::{Document, doc};
use mongodb::options::IndexOptions;
use mongodb::{Client, Database, IndexModel};

use crate::models::qr_record::QrRecord;
use crate::models::tracked_link::TrackedLink;
use crate::models::user::User;

/// Connect, verify the connection with a ping and make sure the indexes the
/// repositories rely on exist.
pub async fn get_database(uri: &str, name: &str) -> Result<Database> {
    let client = Client::with_uri_str(uri)
        .await
        .with_context(|| format!("Failed to parse MongoDB URI {}", uri))?;
    let db = client.database(name);

    db.run_command(doc! { "ping": 1 })
        .await
        .context("MongoDB did not answer ping")?;
    info!("Connected to MongoDB database {}", name);

    ensure_indexes(&db).await?;
    Ok(db)
}

async fn ensure_indexes(db: &Database) -> Result<()> {
    let unique = IndexOptions::builder().unique(true).build();

    db.collection::<User>("users")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(unique.clone())
                .build(),
        )
        .await
        .context("Failed to create users index")?;

    db.collection::<TrackedLink>("links")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "url": 1 })
                .options(unique)
                .build(),
        )
        .await
        .context("Failed to create links index")?;

    let records = db.collection::<QrRecord>("qr_records");
    for keys in [
        doc! { "owner_id": 1, "created_at": -1 },
        doc! { "access_key": 1, "created_at": -1 },
        doc! { "tracking_code": 1 },
    ] {
        records
            .create_index(IndexModel::builder().keys(keys).build())
            .await
            .context("Failed to create qr_records index")?;
    }

    db.collection::<Document>("scans")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "tracking_code": 1, "scan.timestamp": 1 })
                .build(),
        )
        .await
        .context("Failed to create scans index")?;
    Ok(())
}
