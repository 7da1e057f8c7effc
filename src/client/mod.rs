pub mod base;
pub mod poll;
pub mod providers;
pub mod rate_limiter;
pub mod response;

pub use base::{BaseApiClient, CacheMode, ClientConfig, PostBody, QueryParams};
pub use poll::{poll_until, PollConfig, Poller};
pub use rate_limiter::RateLimiter;
pub use response::{count_metadata, format_response, ApiResponse, Metadata};

use crate::Result;
use std::ops::{Deref, DerefMut};

/// Anything built on a [`BaseApiClient`]
pub trait ApiClient {
    fn base(&self) -> &BaseApiClient;

    fn base_mut(&mut self) -> &mut BaseApiClient;

    fn open(&mut self) -> Result<()> {
        self.base_mut().open()
    }

    fn close(&mut self) {
        self.base_mut().close();
    }

    fn is_open(&self) -> bool {
        self.base().is_open()
    }

    /// Open the client for the lifetime of the returned guard.
    ///
    /// The transport is released when the guard drops, on every exit path.
    fn scoped(&mut self) -> Result<Scoped<'_, Self>>
    where
        Self: Sized,
    {
        self.open()?;
        Ok(Scoped { client: self })
    }
}

impl ApiClient for BaseApiClient {
    fn base(&self) -> &BaseApiClient {
        self
    }

    fn base_mut(&mut self) -> &mut BaseApiClient {
        self
    }
}

/// Guard returned by [`ApiClient::scoped`]
#[derive(Debug)]
pub struct Scoped<'a, C: ApiClient> {
    client: &'a mut C,
}

impl<C: ApiClient> Deref for Scoped<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.client
    }
}

impl<C: ApiClient> DerefMut for Scoped<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.client
    }
}

impl<C: ApiClient> Drop for Scoped<'_, C> {
    fn drop(&mut self) {
        self.client.close();
    }
}
