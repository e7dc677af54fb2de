use super::schema::{FileRecord, SearchPage};

/// Slice one page out of the full result set.
///
/// `next_offset` is `None` once `offset + page_size` reaches the total, so
/// "no more pages" never reads as "start again at 0".
pub fn paginate(items: Vec<FileRecord>, offset: usize, page_size: usize) -> SearchPage {
    let total = items.len();
    let next = offset.saturating_add(page_size);
    let files = items.into_iter().skip(offset).take(page_size).collect();

    SearchPage {
        files,
        next_offset: (next < total).then_some(next),
        total,
    }
}
