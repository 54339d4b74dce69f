use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{
    parse_date, parse_timestamp, Bill, BillAction, BillCandidate, BillKey, BillText, BillType,
    Importance, Summary,
};

use super::schema::SCHEMA;

const BILL_COLUMNS: &str = "congress, bill_type, bill_number, title, origin_chamber, \
                            origin_chamber_code, latest_action_date, latest_action_text, \
                            update_date, source_url, actions_synced, importance, \
                            tweet_created, fetched_at";

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Bill operations

    pub async fn find_bill(&self, key: BillKey) -> Result<Option<Bill>> {
        let bill = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {BILL_COLUMNS} FROM bills \
                     WHERE congress = ?1 AND bill_type = ?2 AND bill_number = ?3"
                ))?;
                let bill = stmt
                    .query_row(
                        params![key.congress, key.bill_type.as_str(), key.number],
                        |row| bill_from_row(row),
                    )
                    .optional()?;
                Ok(bill)
            })
            .await?;
        Ok(bill)
    }

    pub async fn insert_bill(&self, candidate: BillCandidate) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO bills (congress, bill_type, bill_number, title, origin_chamber, \
                     origin_chamber_code, latest_action_date, latest_action_text, update_date, \
                     source_url) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    bill_params(&candidate),
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Update the mutable columns in place. Derived bookkeeping flags are
    /// reset because a changed bill invalidates prior analysis.
    pub async fn update_bill(&self, candidate: BillCandidate) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE bills SET title = ?4, origin_chamber = ?5, origin_chamber_code = ?6, \
                     latest_action_date = ?7, latest_action_text = ?8, update_date = ?9, \
                     source_url = ?10, actions_synced = 0, importance = NULL, \
                     tweet_created = 0, fetched_at = datetime('now') \
                     WHERE congress = ?1 AND bill_type = ?2 AND bill_number = ?3",
                    bill_params(&candidate),
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Delete-then-reinsert the full row as one transaction. Used where a
    /// partial update of the denormalized columns would be error-prone.
    pub async fn replace_bill(&self, candidate: BillCandidate) -> Result<()> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM bills WHERE congress = ?1 AND bill_type = ?2 AND bill_number = ?3",
                    params![
                        candidate.key.congress,
                        candidate.key.bill_type.as_str(),
                        candidate.key.number
                    ],
                )?;
                tx.execute(
                    "INSERT INTO bills (congress, bill_type, bill_number, title, origin_chamber, \
                     origin_chamber_code, latest_action_date, latest_action_text, update_date, \
                     source_url) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    bill_params(&candidate),
                )?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn bills_needing_action_sync(&self) -> Result<Vec<Bill>> {
        self.select_bills("actions_synced = 0").await
    }

    pub async fn mark_actions_synced(&self, key: BillKey) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE bills SET actions_synced = 1 \
                     WHERE congress = ?1 AND bill_type = ?2 AND bill_number = ?3",
                    params![key.congress, key.bill_type.as_str(), key.number],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn bills_without_importance(&self) -> Result<Vec<Bill>> {
        self.select_bills("importance IS NULL").await
    }

    pub async fn set_importance(&self, key: BillKey, importance: Importance) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE bills SET importance = ?4 \
                     WHERE congress = ?1 AND bill_type = ?2 AND bill_number = ?3",
                    params![
                        key.congress,
                        key.bill_type.as_str(),
                        key.number,
                        importance.as_str()
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    #[allow(dead_code)]
    pub async fn bills_changed_since(&self, since: DateTime<Utc>) -> Result<Vec<Bill>> {
        let bills = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {BILL_COLUMNS} FROM bills \
                     WHERE update_date > ?1 ORDER BY update_date DESC"
                ))?;
                let bills = stmt
                    .query_map(params![since.to_rfc3339()], |row| bill_from_row(row))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(bills)
            })
            .await?;
        Ok(bills)
    }

    #[allow(dead_code)]
    pub async fn bills_awaiting_post(&self) -> Result<Vec<Bill>> {
        let filter = format!("importance = '{}' AND tweet_created = 0", Importance::MustKnow);
        self.select_bills(&filter).await
    }

    #[allow(dead_code)]
    pub async fn mark_posted(&self, key: BillKey) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE bills SET tweet_created = 1 \
                     WHERE congress = ?1 AND bill_type = ?2 AND bill_number = ?3",
                    params![key.congress, key.bill_type.as_str(), key.number],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn select_bills(&self, filter: &str) -> Result<Vec<Bill>> {
        let sql = format!(
            "SELECT {BILL_COLUMNS} FROM bills WHERE {filter} \
             ORDER BY congress, bill_type, bill_number"
        );
        let bills = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let bills = stmt
                    .query_map([], |row| bill_from_row(row))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(bills)
            })
            .await?;
        Ok(bills)
    }

    // Action operations

    /// Insert any action not already present, leaving existing rows
    /// untouched. Returns the number of newly inserted actions.
    pub async fn insert_actions(&self, actions: Vec<BillAction>) -> Result<usize> {
        let inserted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut inserted = 0usize;
                {
                    let mut stmt = tx.prepare(
                        "INSERT OR IGNORE INTO bill_actions (congress, bill_type, bill_number, \
                         action_code, action_date, action_text, action_type) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    )?;
                    for action in &actions {
                        inserted += stmt.execute(params![
                            action.key.congress,
                            action.key.bill_type.as_str(),
                            action.key.number,
                            action.action_code.clone().unwrap_or_default(),
                            action
                                .action_date
                                .map(|d| d.to_string())
                                .unwrap_or_default(),
                            action.action_text,
                            action.action_type,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(inserted)
            })
            .await?;
        Ok(inserted)
    }

    pub async fn actions_for(&self, key: BillKey) -> Result<Vec<BillAction>> {
        let actions = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT congress, bill_type, bill_number, action_code, action_date, \
                     action_text, action_type FROM bill_actions \
                     WHERE congress = ?1 AND bill_type = ?2 AND bill_number = ?3 \
                     ORDER BY action_date DESC",
                )?;
                let actions = stmt
                    .query_map(
                        params![key.congress, key.bill_type.as_str(), key.number],
                        |row| action_from_row(row),
                    )?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(actions)
            })
            .await?;
        Ok(actions)
    }

    // Text record operations

    /// Bills whose latest action postdates the recorded text row, plus
    /// bills with no text row at all.
    pub async fn bills_needing_text_refresh(&self) -> Result<Vec<Bill>> {
        let bills = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT b.congress, b.bill_type, b.bill_number, b.title, b.origin_chamber, \
                            b.origin_chamber_code, b.latest_action_date, b.latest_action_text, \
                            b.update_date, b.source_url, b.actions_synced, b.importance, \
                            b.tweet_created, b.fetched_at \
                     FROM bills b \
                     LEFT JOIN bill_texts t ON b.congress = t.congress \
                          AND b.bill_type = t.bill_type AND b.bill_number = t.bill_number \
                     WHERE t.congress IS NULL \
                        OR (b.latest_action_date IS NOT NULL AND b.latest_action_date > t.fetched_at) \
                     ORDER BY b.congress, b.bill_type, b.bill_number",
                )?;
                let bills = stmt
                    .query_map([], |row| bill_from_row(row))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(bills)
            })
            .await?;
        Ok(bills)
    }

    pub async fn replace_text_record(&self, text: BillText) -> Result<()> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM bill_texts \
                     WHERE congress = ?1 AND bill_type = ?2 AND bill_number = ?3",
                    params![text.key.congress, text.key.bill_type.as_str(), text.key.number],
                )?;
                tx.execute(
                    "INSERT INTO bill_texts (congress, bill_type, bill_number, text_date, \
                     text_url, xml_url, pdf_url, fetched_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        text.key.congress,
                        text.key.bill_type.as_str(),
                        text.key.number,
                        text.text_date.map(|d| d.to_string()),
                        text.text_url,
                        text.xml_url,
                        text.pdf_url,
                        text.fetched_at.to_rfc3339(),
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn current_text_records(&self) -> Result<Vec<BillText>> {
        let texts = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT congress, bill_type, bill_number, text_date, text_url, xml_url, \
                     pdf_url, fetched_at FROM bill_texts \
                     ORDER BY congress, bill_type, bill_number",
                )?;
                let texts = stmt
                    .query_map([], |row| text_from_row(row))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(texts)
            })
            .await?;
        Ok(texts)
    }

    // Summary operations

    /// Text records whose content date postdates the stored summary, plus
    /// records never summarized. Undated text rows never qualify.
    pub async fn bills_needing_summary(&self) -> Result<Vec<BillText>> {
        let texts = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT t.congress, t.bill_type, t.bill_number, t.text_date, t.text_url, \
                            t.xml_url, t.pdf_url, t.fetched_at \
                     FROM bill_texts t \
                     LEFT JOIN summaries s ON t.congress = s.congress \
                          AND t.bill_type = s.bill_type AND t.bill_number = s.bill_number \
                     WHERE t.text_date IS NOT NULL \
                       AND (s.congress IS NULL OR s.content_date IS NULL \
                            OR t.text_date > s.content_date) \
                     ORDER BY t.congress, t.bill_type, t.bill_number",
                )?;
                let texts = stmt
                    .query_map([], |row| text_from_row(row))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(texts)
            })
            .await?;
        Ok(texts)
    }

    #[allow(dead_code)]
    pub async fn get_summary(&self, key: BillKey) -> Result<Option<Summary>> {
        let summary = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT congress, bill_type, bill_number, content_date, content, \
                     model_version, generated_at FROM summaries \
                     WHERE congress = ?1 AND bill_type = ?2 AND bill_number = ?3",
                )?;
                let summary = stmt
                    .query_row(
                        params![key.congress, key.bill_type.as_str(), key.number],
                        |row| summary_from_row(row),
                    )
                    .optional()?;
                Ok(summary)
            })
            .await?;
        Ok(summary)
    }

    pub async fn save_summary(
        &self,
        key: BillKey,
        content_date: Option<NaiveDate>,
        content: String,
        model: String,
    ) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO summaries (congress, bill_type, bill_number, content_date, \
                     content, model_version) VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                     ON CONFLICT(congress, bill_type, bill_number) DO UPDATE SET \
                         content_date = excluded.content_date, \
                         content = excluded.content, \
                         model_version = excluded.model_version, \
                         generated_at = datetime('now')",
                    params![
                        key.congress,
                        key.bill_type.as_str(),
                        key.number,
                        content_date.map(|d| d.to_string()),
                        content,
                        model,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

fn bill_params(candidate: &BillCandidate) -> [Box<dyn rusqlite::ToSql>; 10] {
    [
        Box::new(candidate.key.congress),
        Box::new(candidate.key.bill_type.as_str()),
        Box::new(candidate.key.number),
        Box::new(candidate.title.clone()),
        Box::new(candidate.origin_chamber.clone()),
        Box::new(candidate.origin_chamber_code.clone()),
        Box::new(candidate.latest_action_date.map(|d| d.to_string())),
        Box::new(candidate.latest_action_text.clone()),
        Box::new(candidate.update_date.map(|dt| dt.to_rfc3339())),
        Box::new(candidate.source_url.clone()),
    ]
}

fn bill_from_row(row: &Row) -> rusqlite::Result<Bill> {
    let bill_type = parse_bill_type(row, 1)?;
    Ok(Bill {
        key: BillKey::new(row.get(0)?, bill_type, row.get(2)?),
        title: row.get(3)?,
        origin_chamber: row.get(4)?,
        origin_chamber_code: row.get(5)?,
        latest_action_date: row
            .get::<_, Option<String>>(6)?
            .and_then(|s| parse_date(&s)),
        latest_action_text: row.get(7)?,
        update_date: row
            .get::<_, Option<String>>(8)?
            .and_then(|s| parse_timestamp(&s)),
        source_url: row.get(9)?,
        actions_synced: row.get::<_, i64>(10)? != 0,
        importance: row
            .get::<_, Option<String>>(11)?
            .and_then(|s| s.parse().ok()),
        tweet_created: row.get::<_, i64>(12)? != 0,
        fetched_at: row
            .get::<_, Option<String>>(13)?
            .and_then(|s| parse_timestamp(&s)),
    })
}

fn action_from_row(row: &Row) -> rusqlite::Result<BillAction> {
    let bill_type = parse_bill_type(row, 1)?;
    let code: String = row.get(3)?;
    let date: String = row.get(4)?;
    Ok(BillAction {
        key: BillKey::new(row.get(0)?, bill_type, row.get(2)?),
        action_code: if code.is_empty() { None } else { Some(code) },
        action_date: parse_date(&date),
        action_text: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        action_type: row.get(6)?,
    })
}

fn text_from_row(row: &Row) -> rusqlite::Result<BillText> {
    let bill_type = parse_bill_type(row, 1)?;
    Ok(BillText {
        key: BillKey::new(row.get(0)?, bill_type, row.get(2)?),
        text_date: row
            .get::<_, Option<String>>(3)?
            .and_then(|s| parse_date(&s)),
        text_url: row.get(4)?,
        xml_url: row.get(5)?,
        pdf_url: row.get(6)?,
        fetched_at: row
            .get::<_, String>(7)
            .ok()
            .and_then(|s| parse_timestamp(&s))
            .unwrap_or_else(Utc::now),
    })
}

fn summary_from_row(row: &Row) -> rusqlite::Result<Summary> {
    let bill_type = parse_bill_type(row, 1)?;
    Ok(Summary {
        key: BillKey::new(row.get(0)?, bill_type, row.get(2)?),
        content_date: row
            .get::<_, Option<String>>(3)?
            .and_then(|s| parse_date(&s)),
        content: row.get(4)?,
        model_version: row.get(5)?,
        generated_at: row
            .get::<_, String>(6)
            .ok()
            .and_then(|s| parse_timestamp(&s))
            .unwrap_or_else(Utc::now),
    })
}

fn parse_bill_type(row: &Row, idx: usize) -> rusqlite::Result<BillType> {
    let raw: String = row.get(idx)?;
    raw.parse::<BillType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
