use duckdb::Connection;
use tracing::info;

const CREATE_CONFIGS: &str = "
CREATE TABLE IF NOT EXISTS tafsiri_configs (
    id VARCHAR PRIMARY KEY,
    config_name VARCHAR NOT NULL,
    tables VARCHAR NOT NULL,
    db_host VARCHAR,
    db_port INTEGER,
    db_user VARCHAR,
    db_password VARCHAR,
    db_name VARCHAR,
    example_prompt VARCHAR,
    om_host VARCHAR,
    om_jwt VARCHAR,
    join_tables VARCHAR NOT NULL,
    created_at VARCHAR NOT NULL,
    updated_at VARCHAR NOT NULL
)";

const CREATE_RESPONSES: &str = "
CREATE TABLE IF NOT EXISTS tafsiri_responses (
    id VARCHAR PRIMARY KEY,
    question VARCHAR NOT NULL,
    response VARCHAR,
    response_rating INTEGER,
    response_rating_comment VARCHAR,
    time_taken_secs DOUBLE NOT NULL,
    created_at VARCHAR NOT NULL,
    created_by VARCHAR,
    is_valid BOOLEAN NOT NULL
)";

/// Creates the document store collections if they are missing.
pub fn run(conn: &Connection) -> Result<(), duckdb::Error> {
    conn.execute_batch(CREATE_CONFIGS)?;
    conn.execute_batch(CREATE_RESPONSES)?;
    info!("Document store schema is up to date");
    Ok(())
}
