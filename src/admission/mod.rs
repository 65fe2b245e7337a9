//! Inventory Gate
//!
//! The single authoritative admission point for one inventory pool.
//!
//! ## Policy
//! Every attempt bumps `requests_seen`. Only every `stride`-th attempt is considered
//! at all, and a considered attempt is granted iff `granted < capacity`. The stride
//! sheds most of a burst cheaply; `granted <= capacity` is the only invariant the
//! rest of the system relies on.
//!
//! Running more than one gate per pool without a shared counter would oversell.

pub mod client;
pub mod controller;
pub mod handlers;
pub mod protocol;

pub use client::AdmissionClient;
pub use controller::{AdmissionController, AdmissionSnapshot};
