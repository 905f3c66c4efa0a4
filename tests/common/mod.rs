#![allow(dead_code)]

use std::sync::OnceLock;

use matador::{Identity, Recipient};

/// RSA key generation dominates test time, so every test in a binary shares
/// the same four identities.
pub fn identities() -> &'static [Identity; 4] {
    static IDS: OnceLock<[Identity; 4]> = OnceLock::new();
    IDS.get_or_init(|| std::array::from_fn(|_| Identity::generate().unwrap()))
}

pub fn alice() -> &'static Identity {
    &identities()[0]
}

pub fn bob() -> &'static Identity {
    &identities()[1]
}

pub fn carol() -> &'static Identity {
    &identities()[2]
}

pub fn dave() -> &'static Identity {
    &identities()[3]
}

pub fn recipients(ids: &[&Identity]) -> Vec<Recipient> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| id.as_recipient(format!("R{i}")))
        .collect()
}
