//! Stoa Integration Tests
//!
//! Deploys the full protocol (tokens, controller, safe manager, safe
//! operations) against mock venue, underlying and oracle contracts on the
//! Odra test VM and drives it through account-level scenarios.

#[cfg(test)]
mod fixture;


#[cfg(test)]
mod safe_flows;
