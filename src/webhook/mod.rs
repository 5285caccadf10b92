//! Webhook handlers for external integrations
//!
//! This module contains webhook endpoint handlers for the messaging
//! platforms that feed conversations into the CRM.
//!
//! ## Modules
//!
//! - [`whatsapp`] - WhatsApp Business Cloud API webhook ingestion

pub mod routes;
pub mod whatsapp;
