// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Source enumerator: ordered listing of the image collection

pub mod gateway;
pub mod http;
pub mod mock;

pub use gateway::{ObjectReference, SourceEnumerator};
pub use http::HttpSourceEnumerator;
pub use mock::MockSourceEnumerator;
