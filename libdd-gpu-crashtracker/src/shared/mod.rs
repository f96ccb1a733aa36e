// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! This module holds the configuration and constants shared by the binding and the tracker

pub(crate) mod configuration;
pub(crate) mod constants;
