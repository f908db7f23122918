//! Lyric line persistence
//!
//! Lines are keyed by `(song_id, line_index, language)`. Writing a line
//! replaces every timing field for that key, so a realignment never leaves
//! word timings from an earlier run next to new line bounds.

use karaoke_common::{time, Result};
use sqlx::{Row, SqlitePool};

use crate::models::{LyricLine, WordTiming};

/// Stored lines for one song and language, in line order
pub async fn load_lines(pool: &SqlitePool, song_id: &str, language: &str) -> Result<Vec<LyricLine>> {
    let rows = sqlx::query(
        r#"
        SELECT song_id, line_index, language, text, start_ms, end_ms, word_timings
        FROM lyric_lines
        WHERE song_id = ? AND language = ?
        ORDER BY line_index ASC
        "#,
    )
    .bind(song_id)
    .bind(language)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<LyricLine> {
            let word_timings: Option<String> = row.try_get("word_timings")?;
            let word_timings: Vec<WordTiming> = match word_timings {
                Some(json) => serde_json::from_str(&json)?,
                None => Vec::new(),
            };

            Ok(LyricLine {
                song_id: row.try_get("song_id")?,
                line_index: row.try_get("line_index")?,
                language: row.try_get("language")?,
                text: row.try_get("text")?,
                start_ms: row.try_get("start_ms")?,
                end_ms: row.try_get("end_ms")?,
                word_timings,
            })
        })
        .collect()
}

/// Insert or overwrite lines in one transaction
///
/// Returns the number of lines written.
pub async fn upsert_lines(pool: &SqlitePool, lines: &[LyricLine]) -> Result<usize> {
    if lines.is_empty() {
        return Ok(0);
    }

    let now = time::to_db(time::now());
    let mut tx = pool.begin().await?;

    for line in lines {
        let word_timings = if line.word_timings.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&line.word_timings)?)
        };

        sqlx::query(
            r#"
            INSERT INTO lyric_lines (song_id, line_index, language, text, start_ms, end_ms, word_timings, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (song_id, line_index, language) DO UPDATE SET
                text = excluded.text,
                start_ms = excluded.start_ms,
                end_ms = excluded.end_ms,
                word_timings = excluded.word_timings,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&line.song_id)
        .bind(line.line_index)
        .bind(&line.language)
        .bind(&line.text)
        .bind(line.start_ms)
        .bind(line.end_ms)
        .bind(word_timings)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(lines.len())
}
