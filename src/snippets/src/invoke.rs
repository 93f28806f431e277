// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Single-call samples.
//!
//! Most samples build one request, send it, and print the response. [Invoke]
//! captures that shape so the samples share the logging around the call.

use crate::Result;

/// A client that can send requests of type `Req`.
///
/// # Example
/// ```
/// # use cloud_samples_snippets::invoke::{Invoke, invoke};
/// # use cloud_samples_snippets::Result;
/// #[derive(Debug)]
/// struct Echo;
/// #[derive(Debug)]
/// struct Ping(u32);
///
/// #[async_trait::async_trait]
/// impl Invoke<Ping> for Echo {
///     type Response = u32;
///     async fn invoke(&self, request: Ping) -> Result<u32> {
///         Ok(request.0)
///     }
/// }
/// # tokio_test::block_on(async {
/// assert_eq!(invoke(&Echo, Ping(7)).await?, 7);
/// # Ok::<(), cloud_samples_snippets::Error>(())
/// # });
/// ```
#[async_trait::async_trait]
pub trait Invoke<Req>: Send + Sync {
    type Response: Send;

    /// Send `request` and return the service response.
    async fn invoke(&self, request: Req) -> Result<Self::Response>;
}

/// Sends `request` through `client`, logging the request and the outcome.
pub async fn invoke<C, Req>(client: &C, request: Req) -> Result<C::Response>
where
    C: Invoke<Req> + ?Sized,
    Req: std::fmt::Debug + Send,
{
    tracing::debug!(?request, "sending request");
    let response = client.invoke(request).await;
    if let Err(e) = &response {
        tracing::warn!("request failed: {e}");
    }
    response
}
