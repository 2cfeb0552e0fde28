// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message persistence keyed by provider message id.

use hostdesk_core::HostdeskError;
use hostdesk_core::types::{InsertOutcome, Message, MessagePatch, NewMessage};
use rusqlite::{Connection, OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::{MESSAGE_COLUMNS, message_from_row, new_id, now, ts};

fn select(conn: &Connection, tenant_id: &str, message_id: &str) -> rusqlite::Result<Option<Message>> {
    conn.query_row(
        &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1 AND tenant_id = ?2"),
        params![message_id, tenant_id],
        message_from_row,
    )
    .optional()
}

fn select_by_external(
    conn: &Connection,
    tenant_id: &str,
    external_message_id: &str,
) -> rusqlite::Result<Option<Message>> {
    conn.query_row(
        &format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE tenant_id = ?1 AND external_message_id = ?2"
        ),
        params![tenant_id, external_message_id],
        message_from_row,
    )
    .optional()
}

/// Inserts inside an open transaction, returning the existing row when the
/// external id is already stored for the tenant.
pub(crate) fn insert_in(conn: &Connection, new: NewMessage) -> rusqlite::Result<InsertOutcome> {
    if let Some(external) = new.external_message_id.as_deref()
        && let Some(existing) = select_by_external(conn, &new.tenant_id, external)?
    {
        return Ok(InsertOutcome::Duplicate(existing));
    }

    let message = Message {
        id: new_id(),
        tenant_id: new.tenant_id,
        conversation_id: new.conversation_id,
        external_message_id: new.external_message_id,
        direction: new.direction,
        message_type: new.message_type,
        content: new.content,
        metadata: new.metadata,
        status: new.status,
        timestamp: new.timestamp,
        created_at: now(),
    };
    conn.execute(
        &format!(
            "INSERT INTO messages ({MESSAGE_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            message.id,
            message.tenant_id,
            message.conversation_id,
            message.external_message_id,
            message.direction.to_string(),
            message.message_type.to_string(),
            message.content,
            message.metadata.to_string(),
            message.status.to_string(),
            ts(&message.timestamp),
            ts(&message.created_at),
        ],
    )?;
    Ok(InsertOutcome::Inserted(message))
}

pub async fn insert(db: &Database, new: NewMessage) -> Result<InsertOutcome, HostdeskError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let outcome = insert_in(&tx, new)?;
            tx.commit()?;
            Ok(outcome)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get(
    db: &Database,
    tenant_id: &str,
    message_id: &str,
) -> Result<Option<Message>, HostdeskError> {
    let tenant_id = tenant_id.to_string();
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| select(conn, &tenant_id, &message_id))
        .await
        .map_err(map_tr_err)
}

pub async fn find_by_external_id(
    db: &Database,
    tenant_id: &str,
    external_message_id: &str,
) -> Result<Option<Message>, HostdeskError> {
    let tenant_id = tenant_id.to_string();
    let external = external_message_id.to_string();
    db.connection()
        .call(move |conn| select_by_external(conn, &tenant_id, &external))
        .await
        .map_err(map_tr_err)
}

/// Tenant owning a provider message id, across all tenants.
///
/// Only used to tell a missing message apart from one that belongs to
/// another tenant; no message content leaves this function.
pub async fn owner_of_external_id(
    db: &Database,
    external_message_id: &str,
) -> Result<Option<String>, HostdeskError> {
    let external = external_message_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT tenant_id FROM messages WHERE external_message_id = ?1 LIMIT 1",
                params![external],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn update(
    db: &Database,
    tenant_id: &str,
    message_id: &str,
    patch: MessagePatch,
) -> Result<Option<Message>, HostdeskError> {
    let tenant_id = tenant_id.to_string();
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(mut message) = select(&tx, &tenant_id, &message_id)? else {
                return Ok(None);
            };
            if let Some(status) = patch.status {
                message.status = status;
            }
            if let Some(external) = patch.external_message_id {
                message.external_message_id = Some(external);
            }
            if let Some(metadata) = patch.metadata {
                message.metadata = metadata;
            }
            tx.execute(
                "UPDATE messages SET status = ?1, external_message_id = ?2, metadata = ?3 \
                 WHERE id = ?4 AND tenant_id = ?5",
                params![
                    message.status.to_string(),
                    message.external_message_id,
                    message.metadata.to_string(),
                    message.id,
                    message.tenant_id,
                ],
            )?;
            tx.commit()?;
            Ok(Some(message))
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_by_conversation(
    db: &Database,
    tenant_id: &str,
    conversation_id: &str,
) -> Result<Vec<Message>, HostdeskError> {
    let tenant_id = tenant_id.to_string();
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages \
                 WHERE tenant_id = ?1 AND conversation_id = ?2 ORDER BY timestamp ASC, created_at ASC"
            ))?;
            let rows = stmt.query_map(params![tenant_id, conversation_id], message_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
