// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact upsert and lookup.
//!
//! WhatsApp contacts are keyed by phone number; Messenger and Instagram
//! contacts by the page-scoped sender id of their channel.

use hostdesk_core::HostdeskError;
use hostdesk_core::types::{Channel, Contact};
use rusqlite::{Connection, OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::{CONTACT_COLUMNS, contact_from_row, new_id, now, ts};

pub(crate) fn select_by_phone(
    conn: &Connection,
    tenant_id: &str,
    phone_number: &str,
) -> rusqlite::Result<Option<Contact>> {
    conn.query_row(
        &format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE tenant_id = ?1 AND phone_number = ?2"
        ),
        params![tenant_id, phone_number],
        contact_from_row,
    )
    .optional()
}

pub(crate) fn select_by_external_id(
    conn: &Connection,
    tenant_id: &str,
    channel: Channel,
    external_id: &str,
) -> rusqlite::Result<Option<Contact>> {
    conn.query_row(
        &format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts \
             WHERE tenant_id = ?1 AND channel = ?2 AND external_id = ?3"
        ),
        params![tenant_id, channel.to_string(), external_id],
        contact_from_row,
    )
    .optional()
}

/// A non-blank `name` that differs from the stored one replaces it.
fn refresh_name(conn: &Connection, contact: &mut Contact, name: Option<&str>) -> rusqlite::Result<()> {
    if let Some(name) = name
        && contact.name.as_deref() != Some(name)
    {
        let now = now();
        conn.execute(
            "UPDATE contacts SET name = ?1, updated_at = ?2 WHERE id = ?3 AND tenant_id = ?4",
            params![name, ts(&now), contact.id, contact.tenant_id],
        )?;
        contact.name = Some(name.to_string());
        contact.updated_at = now;
    }
    Ok(())
}

fn insert(conn: &Connection, contact: &Contact) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO contacts ({CONTACT_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?7)"
        ),
        params![
            contact.id,
            contact.tenant_id,
            contact.channel.to_string(),
            contact.phone_number,
            contact.external_id,
            contact.name,
            ts(&contact.created_at)
        ],
    )?;
    Ok(())
}

fn new_contact(
    tenant_id: &str,
    channel: Channel,
    phone_number: Option<&str>,
    external_id: Option<&str>,
    name: Option<&str>,
) -> Contact {
    let now = now();
    Contact {
        id: new_id(),
        tenant_id: tenant_id.to_string(),
        channel,
        phone_number: phone_number.map(str::to_string),
        external_id: external_id.map(str::to_string),
        name: name.map(str::to_string),
        profile_picture_url: None,
        created_at: now,
        updated_at: now,
    }
}

/// Find-or-create of a WhatsApp contact inside an open transaction.
pub(crate) fn upsert(
    conn: &Connection,
    tenant_id: &str,
    phone_number: &str,
    name: Option<&str>,
) -> rusqlite::Result<Contact> {
    let name = name.map(str::trim).filter(|n| !n.is_empty());
    if let Some(mut contact) = select_by_phone(conn, tenant_id, phone_number)? {
        refresh_name(conn, &mut contact, name)?;
        return Ok(contact);
    }
    let contact = new_contact(tenant_id, Channel::WhatsApp, Some(phone_number), None, name);
    insert(conn, &contact)?;
    Ok(contact)
}

/// Find-or-create of a Messenger or Instagram contact.
pub(crate) fn upsert_external(
    conn: &Connection,
    tenant_id: &str,
    channel: Channel,
    external_id: &str,
    name: Option<&str>,
) -> rusqlite::Result<Contact> {
    let name = name.map(str::trim).filter(|n| !n.is_empty());
    if let Some(mut contact) = select_by_external_id(conn, tenant_id, channel, external_id)? {
        refresh_name(conn, &mut contact, name)?;
        return Ok(contact);
    }
    let contact = new_contact(tenant_id, channel, None, Some(external_id), name);
    insert(conn, &contact)?;
    Ok(contact)
}

pub async fn find_or_create(
    db: &Database,
    tenant_id: &str,
    phone_number: &str,
    name: Option<&str>,
) -> Result<Contact, HostdeskError> {
    let tenant_id = tenant_id.to_string();
    let phone_number = phone_number.to_string();
    let name = name.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let contact = upsert(&tx, &tenant_id, &phone_number, name.as_deref())?;
            tx.commit()?;
            Ok(contact)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_or_create_external(
    db: &Database,
    tenant_id: &str,
    channel: Channel,
    external_id: &str,
    name: Option<&str>,
) -> Result<Contact, HostdeskError> {
    let tenant_id = tenant_id.to_string();
    let external_id = external_id.to_string();
    let name = name.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let contact = upsert_external(&tx, &tenant_id, channel, &external_id, name.as_deref())?;
            tx.commit()?;
            Ok(contact)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_by_phone(
    db: &Database,
    tenant_id: &str,
    phone_number: &str,
) -> Result<Option<Contact>, HostdeskError> {
    let tenant_id = tenant_id.to_string();
    let phone_number = phone_number.to_string();
    db.connection()
        .call(move |conn| select_by_phone(conn, &tenant_id, &phone_number))
        .await
        .map_err(map_tr_err)
}

/// Returns `false` when no contact matched the tenant and id.
pub async fn update_profile_picture(
    db: &Database,
    tenant_id: &str,
    contact_id: &str,
    url: &str,
) -> Result<bool, HostdeskError> {
    let tenant_id = tenant_id.to_string();
    let contact_id = contact_id.to_string();
    let url = url.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE contacts SET profile_picture_url = ?1, updated_at = ?2 \
                 WHERE id = ?3 AND tenant_id = ?4",
                params![url, ts(&now()), contact_id, tenant_id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}
