use std::fs;

use crate::cli::ReplayArgs;
use crate::config::Config;
use crate::param::parse_takeover_workarounds;
use crate::repo::{
    self, SqliteBlockHashRepo, SqliteChangeRepo, SqliteNodeBlobRepo,
};
use crate::{replay, ClaimTrie, Error, Result};

pub(crate) fn handle(config: &Config, args: ReplayArgs) -> Result<()> {
    let data_dir = config.data_dir();
    let target = args.target.unwrap_or(config.replay.target_height);
    let start = args.start.unwrap_or(config.replay.start_height);

    let mut params = config.network.params();
    if let Some(path) = &config.replay.takeover_workarounds_file {
        let contents = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        params.takeover_workarounds = parse_takeover_workarounds(&contents)?;
        tracing::info!(
            entries = params.takeover_workarounds.len(),
            "loaded takeover workarounds"
        );
    }

    let blob_repo = SqliteNodeBlobRepo::open(&repo::node_blobs_path(&data_dir))?;
    let change_repo = SqliteChangeRepo::open(&repo::changes_path(&data_dir))?;
    let block_repo = SqliteBlockHashRepo::open(&repo::block_hashes_path(&data_dir))?;

    let mut ct = ClaimTrie::new(params, Box::new(blob_repo));
    tracing::info!(start, target, data_dir = %data_dir.display(), "replay starting");
    replay::replay_from(&mut ct, &change_repo, &block_repo, start, target)?;
    let root = ct.merkle_hash()?;
    tracing::info!(height = ct.height(), root = %root, "replay complete");
    ct.close()?;
    Ok(())
}
