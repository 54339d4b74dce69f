pub const SCHEMA: &str = r#"
-- bills table
CREATE TABLE IF NOT EXISTS bills (
    congress INTEGER NOT NULL,
    bill_type TEXT NOT NULL,
    bill_number INTEGER NOT NULL,
    title TEXT NOT NULL,
    origin_chamber TEXT,
    origin_chamber_code TEXT,
    latest_action_date TEXT,
    latest_action_text TEXT,
    update_date TEXT,
    source_url TEXT,
    actions_synced INTEGER NOT NULL DEFAULT 0,
    importance TEXT,
    tweet_created INTEGER NOT NULL DEFAULT 0,
    fetched_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (congress, bill_type, bill_number)
);

CREATE INDEX IF NOT EXISTS idx_bills_update_date ON bills(update_date DESC);
CREATE INDEX IF NOT EXISTS idx_bills_actions_synced ON bills(actions_synced);
CREATE INDEX IF NOT EXISTS idx_bills_importance ON bills(importance);

-- bill_actions table (append-only history; empty strings stand in for
-- missing codes/dates so the primary key can dedupe them)
CREATE TABLE IF NOT EXISTS bill_actions (
    congress INTEGER NOT NULL,
    bill_type TEXT NOT NULL,
    bill_number INTEGER NOT NULL,
    action_code TEXT NOT NULL DEFAULT '',
    action_date TEXT NOT NULL DEFAULT '',
    action_text TEXT,
    action_type TEXT,
    PRIMARY KEY (congress, bill_type, bill_number, action_code, action_date)
);

CREATE INDEX IF NOT EXISTS idx_bill_actions_key ON bill_actions(congress, bill_type, bill_number);

-- bill_texts table (latest text version per bill)
CREATE TABLE IF NOT EXISTS bill_texts (
    congress INTEGER NOT NULL,
    bill_type TEXT NOT NULL,
    bill_number INTEGER NOT NULL,
    text_date TEXT,
    text_url TEXT,
    xml_url TEXT,
    pdf_url TEXT,
    fetched_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (congress, bill_type, bill_number)
);

-- summaries table
CREATE TABLE IF NOT EXISTS summaries (
    congress INTEGER NOT NULL,
    bill_type TEXT NOT NULL,
    bill_number INTEGER NOT NULL,
    content_date TEXT,
    content TEXT NOT NULL,
    model_version TEXT NOT NULL,
    generated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (congress, bill_type, bill_number)
);
"#;
