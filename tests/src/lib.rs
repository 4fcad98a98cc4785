//! Cross-crate scenarios: full handshakes against the mock backend and a
//! headless run of the desktop UI.

#[cfg(test)]
mod support;

#[cfg(test)]
mod handshake_scenarios;

#[cfg(test)]
mod ui_smoke;
