// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection gateway: label and text classification of stored images

pub mod gateway;
pub mod http;
pub mod mock;

pub use gateway::{DetectionGateway, Label, TextToken, TokenKind};
pub use http::HttpDetectionGateway;
pub use mock::MockDetectionGateway;
