use async_trait::async_trait;

use super::PriceProcessor;
use super::ProcessorError;
use crate::Price;

/// Publishes the submitted price unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct RewritingPriceProcessor;

#[async_trait]
impl PriceProcessor for RewritingPriceProcessor {
    async fn process(
        &self,
        price: Price,
    ) -> std::result::Result<Price, ProcessorError> {
        Ok(price)
    }
}
