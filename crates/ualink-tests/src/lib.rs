// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Integration test support for the ualink client.
//!
//! The [`common`] module provides an in-process mock server that speaks
//! real framed bytes through the client's connection seam, plus a harness
//! wiring a client to it with a state-transition recorder. The integration
//! suites live in `tests/`.

pub mod common;
