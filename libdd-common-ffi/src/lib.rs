// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod error;
mod handle;
mod result;
pub mod utils;

pub use error::*;
pub use handle::*;
pub use result::*;
