// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Shared test support: the in-process mock server and the harness.

pub mod harness;
pub mod mock_server;

pub use harness::{init_tracing, StateRecorder, TestSetup};
pub use mock_server::{MockConnection, MockServer};
