//! Runs the same streaming scenarios against every connector, each backed by
//! a wiremock server speaking that vendor's wire format.

mod providers;
mod streaming_e2e;
