//! PostgreSQL implementations of the reconciliation and directory seams.

use postgres::{Client, NoTls, Transaction};
use tracing::{debug, info, instrument};

use crate::config::{DB_CONNECT_TIMEOUT, DbConfig};
use crate::directory::{DirectoryWriter, RowPlan};
use crate::error::{Result, ToolError};
use crate::model::{DirectoryRecord, RecordTable, Tier};
use crate::reconcile::{FolderLink, RecordStore};

/// Opens a connection with the configured 15 second connect timeout.
#[instrument(level = "debug", skip_all, fields(host = %config.host, db = %config.name))]
pub fn connect(config: &DbConfig) -> Result<Client> {
    let client = postgres::Config::new()
        .host(&config.host)
        .port(config.port)
        .dbname(&config.name)
        .user(&config.user)
        .password(&config.password)
        .connect_timeout(DB_CONNECT_TIMEOUT)
        .connect(NoTls)?;
    debug!("connected to database");
    Ok(client)
}

fn select_records(tier: Tier) -> &'static str {
    match tier {
        Tier::Company => {
            "SELECT id::bigint, tla, drive_folder_id FROM clients WHERE tla IS NOT NULL"
        }
        Tier::Contact => {
            "SELECT id::bigint, bsb_client_code, drive_folder_id FROM bsb_client_codes \
             WHERE bsb_client_code IS NOT NULL"
        }
    }
}

fn update_link(tier: Tier) -> &'static str {
    match tier {
        Tier::Company => "UPDATE clients SET drive_folder_id = $1 WHERE id = $2::bigint",
        Tier::Contact => "UPDATE bsb_client_codes SET drive_folder_id = $1 WHERE id = $2::bigint",
    }
}

/// Record store over the `clients` and `bsb_client_codes` tables. Links are
/// kept in memory until [`RecordStore::commit`].
pub struct PostgresRecordStore {
    client: Client,
    staged: Vec<FolderLink>,
}

impl PostgresRecordStore {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            staged: Vec::new(),
        }
    }
}

impl RecordStore for PostgresRecordStore {
    fn load_records(&mut self, tier: Tier) -> Result<RecordTable> {
        let mut records = RecordTable::new();
        for row in self.client.query(select_records(tier), &[])? {
            let id: i64 = row.try_get(0)?;
            let key: String = row.try_get(1)?;
            let folder_id: Option<String> = row.try_get(2)?;
            records.insert(key, DirectoryRecord::new(id, folder_id));
        }
        debug!(table = tier.table(), count = records.len(), "loaded records");
        Ok(records)
    }

    fn stage_link(&mut self, link: FolderLink) -> Result<()> {
        self.staged.push(link);
        Ok(())
    }

    fn commit(&mut self) -> Result<usize> {
        if self.staged.is_empty() {
            return Ok(0);
        }
        let mut transaction = self.client.transaction()?;
        for link in &self.staged {
            transaction.execute(update_link(link.tier), &[&link.folder_id, &link.record_id])?;
        }
        transaction.commit()?;

        let written = self.staged.len();
        self.staged.clear();
        info!(written, "committed folder links");
        Ok(written)
    }
}

/// Directory writer running every row inside a savepoint of one outer
/// transaction; a failed row is rolled back to its savepoint.
pub struct PostgresDirectoryWriter<'a> {
    transaction: Option<Transaction<'a>>,
}

impl<'a> PostgresDirectoryWriter<'a> {
    pub fn begin(client: &'a mut Client) -> Result<Self> {
        Ok(Self {
            transaction: Some(client.transaction()?),
        })
    }

    fn transaction(&mut self) -> Result<&mut Transaction<'a>> {
        self.transaction
            .as_mut()
            .ok_or_else(|| ToolError::ConnectionLost("transaction already committed".into()))
    }
}

/// Maps a failure on a closed connection to [`ToolError::ConnectionLost`] so
/// the batch stops instead of failing every remaining row.
fn row_error(err: postgres::Error) -> ToolError {
    if err.is_closed() {
        ToolError::ConnectionLost(err.to_string())
    } else {
        ToolError::Database(err)
    }
}

impl DirectoryWriter for PostgresDirectoryWriter<'_> {
    fn write_row(&mut self, plan: &RowPlan) -> Result<()> {
        let mut savepoint = self.transaction()?.savepoint("directory_row").map_err(row_error)?;

        if let Some(client) = &plan.client {
            savepoint
                .execute(
                    "SELECT upsert_client($1::text, $2::text, $3::text)",
                    &[&client.tla, &client.client_name, &client.formatted_client_name],
                )
                .map_err(row_error)?;
        }

        let code = &plan.code;
        savepoint
            .execute(
                "SELECT upsert_client_code($1::text, $2::text, $3::text, $4::text, $5::text, \
                 $6::text, $7::text, $8::text, $9::text)",
                &[
                    &code.code,
                    &code.tla,
                    &code.primary_contact,
                    &code.primary_contact_email,
                    &code.payment_terms,
                    &code.po_required,
                    &code.billing_contact,
                    &code.billing_email,
                    &code.billing_address,
                ],
            )
            .map_err(row_error)?;

        savepoint.commit().map_err(row_error)
    }

    fn commit(&mut self) -> Result<()> {
        if let Some(transaction) = self.transaction.take() {
            transaction.commit()?;
            info!("committed directory rows");
        }
        Ok(())
    }
}
