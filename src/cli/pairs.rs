//! Pairs subcommand.

use clap::Parser;
use color_eyre::Result;

use crate::di::FromRef;
use crate::repositories::SimilarityRepository;

/// List the highest-weight pairs of the current generation.
#[derive(Parser)]
pub struct PairsCommand {
    /// Only pairs at or above this Jaccard weight.
    #[arg(long, default_value_t = 0.0)]
    pub min_jaccard: f64,

    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

impl PairsCommand {
    pub async fn run(self) -> Result<()> {
        let ctx = super::connect().await?;
        let similarity = SimilarityRepository::from_ref(&ctx);

        let generation = similarity.current_generation().await?;
        let total = similarity.count(generation).await?;
        let pairs = similarity
            .top_pairs(generation, self.min_jaccard, self.limit)
            .await?;

        println!("# generation {}, {} edges", generation, total);
        println!("source\ttarget\tjaccard\tshared\tunion");
        for pair in &pairs {
            println!(
                "{}\t{}\t{:.4}\t{}\t{}",
                pair.source,
                pair.target,
                pair.jaccard_weight,
                pair.shared_domains.map_or("-".to_string(), |n| n.to_string()),
                pair.union_domains.map_or("-".to_string(), |n| n.to_string()),
            );
        }
        tracing::info!(generation, total, pairs = pairs.len(), "Listed pairs");
        Ok(())
    }
}
