use futures_util::{TryStreamExt, stream};
use tokio_stream::Stream;
use tracing::debug;

use crate::client::TableClient;
use crate::error::StoreError;
use crate::table::helpers::request;
use crate::table::types::{ItemKey, KeySchema, Projection, RequestOptions};

/// Paging state of one scan
struct Pager<'a, C> {
    client: &'a C,
    table: &'a str,
    schema: KeySchema,
    projection: Projection,
    page_size: Option<i32>,
    options: RequestOptions,
    start_key: Option<ItemKey>,
    pages: usize,
    finished: bool,
}

/// Stream the key of every item in `table`
///
/// Only the key attributes are requested. The scan follows `LastEvaluatedKey`
/// until the store reports no further pages; an empty page that still carries a
/// continuation token does not end the scan. The first failed page request ends
/// the stream with that error, without retry. Calling `scan` again starts over
/// from the first page.
///
/// Items written while the scan runs may or may not be visible to it.
pub fn scan<'a, C>(
    client: &'a C,
    table: &'a str,
    schema: &KeySchema,
    page_size: Option<i32>,
    options: RequestOptions,
) -> impl Stream<Item = Result<ItemKey, StoreError>> + Send + use<'a, C>
where
    C: TableClient,
{
    let pager = Pager {
        client,
        table,
        schema: schema.clone(),
        projection: schema.projection(),
        page_size,
        options,
        start_key: None,
        pages: 0,
        finished: false,
    };

    stream::try_unfold(pager, |mut pager| async move {
        if pager.finished {
            return Ok::<_, StoreError>(None);
        }

        let page = request::bounded(
            pager.client.scan_page(
                pager.table,
                &pager.projection,
                pager.start_key.take(),
                pager.page_size,
            ),
            &pager.options,
        )
        .await?;

        pager.pages += 1;
        pager.finished = page.last_evaluated_key.is_none();
        pager.start_key = page.last_evaluated_key;

        debug!(
            table = pager.table,
            page = pager.pages,
            items = page.items.len(),
            more = !pager.finished,
            "scanned page"
        );

        let keys: Vec<ItemKey> = page
            .items
            .into_iter()
            .map(|item| pager.schema.retain_key(item))
            .collect();

        Ok(Some((keys, pager)))
    })
    .map_ok(|keys| stream::iter(keys.into_iter().map(Ok::<_, StoreError>)))
    .try_flatten()
}
