use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use tracing::debug;

use fattura_core::workflow::{next_conversion_in_year, next_in_year};
use fattura_core::{
    DocumentType, Invoice, InvoiceLine, InvoiceRepository, InvoiceStatus, NewInvoice,
    NewInvoiceLine, NewPackage, Package, RepositoryError, SdiStatus,
};

use crate::decimal::{decimal_to_f64, get_decimal};

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .with_context(|| format!("Failed to connect to database: {}", database_url))?;
        Ok(Self { pool })
    }

    pub fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Highest-number scan for the year, performed inside the caller's
    /// transaction so concurrent submissions cannot draw the same number.
    async fn existing_numbers(
        tx: &mut Transaction<'_, Sqlite>,
    ) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query("SELECT numero FROM fatture")
            .fetch_all(&mut **tx)
            .await
            .map_err(db_err)?;
        rows.iter()
            .map(|row| row.try_get("numero").map_err(db_err))
            .collect()
    }

    async fn insert_invoice_row(
        tx: &mut Transaction<'_, Sqlite>,
        invoice: &NewInvoice,
        numero: &str,
        now: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO fatture (
                numero, data, paziente_id, tipo_documento, metodo_pagamento,
                stato, pagata, imponibile, iva_importo, cassa_previdenziale,
                ritenuta_acconto, contributo_integrativo, bollo_virtuale, totale,
                fattura_originale_id, fattura_originale_numero, fattura_originale_data,
                convertita_da_id, ts_inviata, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(numero)
        .bind(invoice.data)
        .bind(invoice.paziente_id)
        .bind(invoice.tipo_documento.as_str())
        .bind(&invoice.metodo_pagamento)
        .bind(InvoiceStatus::DaInviare.as_str())
        .bind(decimal_to_f64(invoice.imponibile))
        .bind(decimal_to_f64(invoice.iva_importo))
        .bind(decimal_to_f64(invoice.cassa_previdenziale))
        .bind(decimal_to_f64(invoice.ritenuta_acconto))
        .bind(decimal_to_f64(invoice.contributo_integrativo))
        .bind(decimal_to_f64(invoice.bollo_virtuale))
        .bind(decimal_to_f64(invoice.totale))
        .bind(invoice.fattura_originale_id)
        .bind(&invoice.fattura_originale_numero)
        .bind(invoice.fattura_originale_data)
        .bind(invoice.convertita_da_id)
        .bind(now)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;

        Ok(result.last_insert_rowid())
    }

    async fn insert_lines(
        tx: &mut Transaction<'_, Sqlite>,
        fattura_id: i64,
        lines: &[NewInvoiceLine],
    ) -> Result<(), RepositoryError> {
        for line in lines {
            sqlx::query(
                "INSERT INTO fattura_dettagli (
                    fattura_id, descrizione, servizio_id, quantita,
                    prezzo_unitario, sconto_pct, codice_iva
                 ) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(fattura_id)
            .bind(&line.descrizione)
            .bind(line.servizio_id)
            .bind(decimal_to_f64(line.quantita))
            .bind(decimal_to_f64(line.prezzo_unitario))
            .bind(decimal_to_f64(line.sconto_pct))
            .bind(&line.codice_iva)
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;
        }
        Ok(())
    }
}

fn db_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Database(e.to_string())
}

fn row_to_invoice(row: &SqliteRow) -> Result<Invoice, RepositoryError> {
    let tipo_str: String = row.try_get("tipo_documento").map_err(db_err)?;
    let tipo_documento = DocumentType::parse(&tipo_str)
        .ok_or_else(|| RepositoryError::Database(format!("Invalid document type: {}", tipo_str)))?;

    let stato_str: String = row.try_get("stato").map_err(db_err)?;
    let stato = InvoiceStatus::parse(&stato_str)
        .ok_or_else(|| RepositoryError::Database(format!("Invalid status: {}", stato_str)))?;

    let sdi_str: Option<String> = row.try_get("sdi_stato").map_err(db_err)?;
    let sdi_stato = match sdi_str {
        Some(s) => Some(
            SdiStatus::parse(&s)
                .ok_or_else(|| RepositoryError::Database(format!("Invalid SDI status: {}", s)))?,
        ),
        None => None,
    };

    Ok(Invoice {
        id: row.try_get("id").map_err(db_err)?,
        numero: row.try_get("numero").map_err(db_err)?,
        data: row.try_get("data").map_err(db_err)?,
        paziente_id: row.try_get("paziente_id").map_err(db_err)?,
        tipo_documento,
        metodo_pagamento: row.try_get("metodo_pagamento").map_err(db_err)?,
        stato,
        pagata: row.try_get("pagata").map_err(db_err)?,
        data_pagamento: row.try_get("data_pagamento").map_err(db_err)?,
        imponibile: get_decimal(row, "imponibile")?,
        iva_importo: get_decimal(row, "iva_importo")?,
        cassa_previdenziale: get_decimal(row, "cassa_previdenziale")?,
        ritenuta_acconto: get_decimal(row, "ritenuta_acconto")?,
        contributo_integrativo: get_decimal(row, "contributo_integrativo")?,
        bollo_virtuale: get_decimal(row, "bollo_virtuale")?,
        totale: get_decimal(row, "totale")?,
        fattura_originale_id: row.try_get("fattura_originale_id").map_err(db_err)?,
        fattura_originale_numero: row.try_get("fattura_originale_numero").map_err(db_err)?,
        fattura_originale_data: row.try_get("fattura_originale_data").map_err(db_err)?,
        convertita_da_id: row.try_get("convertita_da_id").map_err(db_err)?,
        convertita_in_id: row.try_get("convertita_in_id").map_err(db_err)?,
        sdi_stato,
        ts_inviata: row.try_get("ts_inviata").map_err(db_err)?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(db_err)?,
        updated_at: row
            .try_get::<DateTime<Utc>, _>("updated_at")
            .map_err(db_err)?,
    })
}

fn row_to_line(row: &SqliteRow) -> Result<InvoiceLine, RepositoryError> {
    Ok(InvoiceLine {
        id: row.try_get("id").map_err(db_err)?,
        fattura_id: row.try_get("fattura_id").map_err(db_err)?,
        descrizione: row.try_get("descrizione").map_err(db_err)?,
        servizio_id: row.try_get("servizio_id").map_err(db_err)?,
        quantita: get_decimal(row, "quantita")?,
        prezzo_unitario: get_decimal(row, "prezzo_unitario")?,
        sconto_pct: get_decimal(row, "sconto_pct")?,
        codice_iva: row.try_get("codice_iva").map_err(db_err)?,
    })
}

fn row_to_package(row: &SqliteRow) -> Result<Package, RepositoryError> {
    Ok(Package {
        id: row.try_get("id").map_err(db_err)?,
        paziente_id: row.try_get("paziente_id").map_err(db_err)?,
        servizio_id: row.try_get("servizio_id").map_err(db_err)?,
        quantita_totale: row.try_get("quantita_totale").map_err(db_err)?,
        quantita_utilizzata: row.try_get("quantita_utilizzata").map_err(db_err)?,
        prezzo_totale: get_decimal(row, "prezzo_totale")?,
        prezzo_per_seduta: get_decimal(row, "prezzo_per_seduta")?,
        fattura_id: row.try_get("fattura_id").map_err(db_err)?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(db_err)?,
        updated_at: row
            .try_get::<DateTime<Utc>, _>("updated_at")
            .map_err(db_err)?,
    })
}

const SELECT_INVOICE: &str = "SELECT * FROM fatture WHERE id = ?";

#[async_trait]
impl InvoiceRepository for SqliteRepository {
    async fn create_invoice(
        &self,
        invoice: NewInvoice,
        lines: Vec<NewInvoiceLine>,
    ) -> Result<Invoice, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let existing = Self::existing_numbers(&mut tx).await?;
        let numero = next_in_year(existing.iter().map(String::as_str), invoice.data.year());
        debug!(numero = %numero, "creating document");

        let now = Utc::now();
        let id = Self::insert_invoice_row(&mut tx, &invoice, &numero.to_string(), now).await?;
        Self::insert_lines(&mut tx, id, &lines).await?;

        tx.commit().await.map_err(db_err)?;
        self.get_invoice(id).await
    }

    async fn get_invoice(&self, id: i64) -> Result<Invoice, RepositoryError> {
        let row = sqlx::query(SELECT_INVOICE)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or(RepositoryError::NotFound)?;
        row_to_invoice(&row)
    }

    async fn list_invoices(&self, anno: Option<i32>) -> Result<Vec<Invoice>, RepositoryError> {
        let rows = match anno {
            Some(anno) => {
                // Dates are stored ISO-8601, so the year is a string prefix.
                sqlx::query("SELECT * FROM fatture WHERE data LIKE ? ORDER BY numero DESC")
                    .bind(format!("{anno}-%"))
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM fatture ORDER BY data DESC, numero DESC")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(db_err)?;

        rows.iter().map(row_to_invoice).collect()
    }

    async fn get_invoice_lines(
        &self,
        fattura_id: i64,
    ) -> Result<Vec<InvoiceLine>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM fattura_dettagli WHERE fattura_id = ? ORDER BY id")
            .bind(fattura_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(row_to_line).collect()
    }

    async fn update_invoice(
        &self,
        invoice: &Invoice,
        lines: Vec<NewInvoiceLine>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let result = sqlx::query(
            "UPDATE fatture SET
                data = ?, paziente_id = ?, tipo_documento = ?, metodo_pagamento = ?,
                stato = ?, pagata = ?, data_pagamento = ?,
                imponibile = ?, iva_importo = ?, cassa_previdenziale = ?,
                ritenuta_acconto = ?, contributo_integrativo = ?, bollo_virtuale = ?,
                totale = ?, fattura_originale_id = ?, fattura_originale_numero = ?,
                fattura_originale_data = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(invoice.data)
        .bind(invoice.paziente_id)
        .bind(invoice.tipo_documento.as_str())
        .bind(&invoice.metodo_pagamento)
        .bind(invoice.stato.as_str())
        .bind(invoice.pagata)
        .bind(invoice.data_pagamento)
        .bind(decimal_to_f64(invoice.imponibile))
        .bind(decimal_to_f64(invoice.iva_importo))
        .bind(decimal_to_f64(invoice.cassa_previdenziale))
        .bind(decimal_to_f64(invoice.ritenuta_acconto))
        .bind(decimal_to_f64(invoice.contributo_integrativo))
        .bind(decimal_to_f64(invoice.bollo_virtuale))
        .bind(decimal_to_f64(invoice.totale))
        .bind(invoice.fattura_originale_id)
        .bind(&invoice.fattura_originale_numero)
        .bind(invoice.fattura_originale_data)
        .bind(Utc::now())
        .bind(invoice.id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        // Replacing the detail rows happens under the same transaction as
        // the header update: a failure here rolls everything back.
        sqlx::query("DELETE FROM fattura_dettagli WHERE fattura_id = ?")
            .bind(invoice.id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        Self::insert_lines(&mut tx, invoice.id, &lines).await?;

        tx.commit().await.map_err(db_err)
    }

    async fn delete_invoice(&self, id: i64) -> Result<(), RepositoryError> {
        let invoice = self.get_invoice(id).await?;
        if invoice.pagata {
            return Err(RepositoryError::InvoicePaid);
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        sqlx::query("DELETE FROM fattura_dettagli WHERE fattura_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query("DELETE FROM fatture WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)
    }

    async fn mark_paid(
        &self,
        id: i64,
        data_pagamento: NaiveDate,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE fatture SET pagata = 1, data_pagamento = ?, stato = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(data_pagamento)
        .bind(InvoiceStatus::Pagata.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn set_sdi_status(&self, id: i64, stato: SdiStatus) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE fatture SET sdi_stato = ?, updated_at = ? WHERE id = ?")
            .bind(stato.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn convert_invoice(
        &self,
        original_id: i64,
        converted: NewInvoice,
        lines: Vec<NewInvoiceLine>,
    ) -> Result<Invoice, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let existing = Self::existing_numbers(&mut tx).await?;
        let numero =
            next_conversion_in_year(existing.iter().map(String::as_str), converted.data.year());
        debug!(numero = %numero, original_id, "converting document");

        let now = Utc::now();
        let id = Self::insert_invoice_row(&mut tx, &converted, &numero.to_string(), now).await?;
        Self::insert_lines(&mut tx, id, &lines).await?;

        let result =
            sqlx::query("UPDATE fatture SET convertita_in_id = ?, updated_at = ? WHERE id = ?")
                .bind(id)
                .bind(now)
                .bind(original_id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await.map_err(db_err)?;
        self.get_invoice(id).await
    }

    async fn create_package(&self, package: NewPackage) -> Result<Package, RepositoryError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO pacchetti (
                paziente_id, servizio_id, quantita_totale, prezzo_totale,
                prezzo_per_seduta, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(package.paziente_id)
        .bind(package.servizio_id)
        .bind(package.quantita_totale)
        .bind(decimal_to_f64(package.prezzo_totale))
        .bind(decimal_to_f64(package.prezzo_per_seduta))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        self.get_package(result.last_insert_rowid()).await
    }

    async fn create_package_with_invoice(
        &self,
        package: NewPackage,
        invoice: NewInvoice,
        lines: Vec<NewInvoiceLine>,
    ) -> Result<(Package, Invoice), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let existing = Self::existing_numbers(&mut tx).await?;
        let numero = next_in_year(existing.iter().map(String::as_str), invoice.data.year());
        let now = Utc::now();
        let fattura_id = Self::insert_invoice_row(&mut tx, &invoice, &numero.to_string(), now).await?;
        Self::insert_lines(&mut tx, fattura_id, &lines).await?;

        let result = sqlx::query(
            "INSERT INTO pacchetti (
                paziente_id, servizio_id, quantita_totale, prezzo_totale,
                prezzo_per_seduta, fattura_id, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(package.paziente_id)
        .bind(package.servizio_id)
        .bind(package.quantita_totale)
        .bind(decimal_to_f64(package.prezzo_totale))
        .bind(decimal_to_f64(package.prezzo_per_seduta))
        .bind(fattura_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        let package_id = result.last_insert_rowid();

        tx.commit().await.map_err(db_err)?;

        let package = self.get_package(package_id).await?;
        let invoice = self.get_invoice(fattura_id).await?;
        Ok((package, invoice))
    }

    async fn get_package(&self, id: i64) -> Result<Package, RepositoryError> {
        let row = sqlx::query("SELECT * FROM pacchetti WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or(RepositoryError::NotFound)?;
        row_to_package(&row)
    }

    async fn list_packages(&self, paziente_id: i64) -> Result<Vec<Package>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM pacchetti WHERE paziente_id = ? ORDER BY id")
            .bind(paziente_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(row_to_package).collect()
    }

    async fn consume_session(&self, id: i64) -> Result<Package, RepositoryError> {
        let result = sqlx::query(
            "UPDATE pacchetti
             SET quantita_utilizzata = quantita_utilizzata + 1, updated_at = ?
             WHERE id = ? AND quantita_utilizzata < quantita_totale",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            // Distinguish a missing package from an exhausted one.
            let package = self.get_package(id).await?;
            if package.is_exhausted() {
                return Err(RepositoryError::PackageExhausted);
            }
            return Err(RepositoryError::NotFound);
        }

        self.get_package(id).await
    }
}
