use uuid::Uuid;

use crate::back_matter::BackMatter;
use crate::error::Result;
use crate::metadata::Metadata;
use crate::owner::{DocumentKind, OwnerKind};
use crate::rows::{EntityRow, RowIndex, RowSet};

pub trait Aggregate: Sized {
    const KIND: DocumentKind;
    type External;

    fn decode(ext: &Self::External) -> Result<Self>;

    fn encode(&self) -> Self::External;

    fn id(&self) -> Uuid;

    fn metadata(&self) -> &Metadata;

    fn to_rows(&self) -> Result<RowSet>;

    fn from_rows(root: &EntityRow, index: RowIndex<'_>) -> Result<Self>;
}

/// Loads the metadata and optional back-matter blocks owned by a root.
pub(crate) fn load_blocks(
    index: RowIndex<'_>,
    root_id: Uuid,
    kind: DocumentKind,
) -> Result<(Metadata, Option<BackMatter>)> {
    let metadata = index.require_owned::<Metadata>(root_id, kind.tag())?;
    let back_matter = index.owned_one::<BackMatter>(root_id, kind.tag())?;
    Ok((metadata, back_matter))
}

/// Starts a row set with the root body and its owned blocks.
pub(crate) fn start_rows<R: crate::rows::Entity>(
    root: &R,
    metadata: &Metadata,
    back_matter: &Option<BackMatter>,
) -> Result<RowSet> {
    let mut rows = RowSet::new(root.id());
    rows.push(root)?;
    rows.push(metadata)?;
    rows.push_opt(back_matter)?;
    Ok(rows)
}
