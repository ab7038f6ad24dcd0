/*
 * Copyright © 2024, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

use std::time::Duration;
use thiserror::Error;

use crate::reducer::BudgetShortfall;

pub type Result<T> = std::result::Result<T, EoIndicatorsError>;

#[derive(Error,Debug)]
pub enum EoIndicatorsError {
    #[error("IO error {0}")]
    IOError( #[from] std::io::Error),

    #[error("config error {0}")]
    ConfigLoadError( #[from] eo_common::EoCommonError),

    /// invalid or missing region, dataset or parameter. Always detected before any provider call
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// transient network/quota failure of the imagery archive (after retries have been exhausted)
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("pixel budget exceeded: {0}")]
    BudgetExceeded(BudgetShortfall),

    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("operation cancelled")]
    Cancelled,

    #[error("JSON error {0}")]
    JsonError( #[from] serde_json::Error),

    #[error("CSV error {0}")]
    CsvError( #[from] csv::Error),

    /// a generic error
    #[error("operation failed {0}")]
    OpFailed(String)
}

impl EoIndicatorsError {
    pub fn is_configuration_error (&self)->bool {
        matches!( self, EoIndicatorsError::ConfigurationError(_) | EoIndicatorsError::ConfigLoadError(_))
    }

    /// errors that are worth another provider call attempt
    pub fn is_transient (&self)->bool {
        matches!( self, EoIndicatorsError::ProviderUnavailable(_) | EoIndicatorsError::Timeout(_))
    }

    /// process exit code for binaries
    pub fn exit_code (&self)->i32 {
        match self {
            EoIndicatorsError::ConfigurationError(_) | EoIndicatorsError::ConfigLoadError(_) => 2,
            EoIndicatorsError::ProviderUnavailable(_) | EoIndicatorsError::Timeout(_) => 3,
            EoIndicatorsError::BudgetExceeded(_) => 4,
            _ => 1
        }
    }
}

pub fn configuration_error (msg: impl ToString)->EoIndicatorsError {
    EoIndicatorsError::ConfigurationError(msg.to_string())
}

pub fn provider_unavailable (msg: impl ToString)->EoIndicatorsError {
    EoIndicatorsError::ProviderUnavailable(msg.to_string())
}

pub fn op_failed (msg: impl ToString)->EoIndicatorsError {
    EoIndicatorsError::OpFailed(msg.to_string())
}
