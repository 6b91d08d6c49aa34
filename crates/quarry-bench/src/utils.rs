//! Benchmark fixtures.
//!
//! Tables are generated from a fixed seed so runs are comparable.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use quarry_common::{EngineConfig, PlannerConfig, QuarryResult};
use quarry_sql::Engine;

/// Generates random string data for benchmarks.
pub fn random_string(rng: &mut StdRng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Rows of `k:int, v:int, s:string` with `k` drawn from `0..key_range`.
pub fn generate_rows(count: usize, key_range: i32, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut text = String::with_capacity(count * 24);
    for i in 0..count {
        let k = rng.gen_range(0..key_range.max(1));
        let s = random_string(&mut rng, 8);
        // Writing to a String cannot fail.
        let _ = writeln!(text, "{k}|{i}|{s}");
    }
    text
}

/// A scratch data directory with an open engine.
pub struct Fixture {
    dir: TempDir,
    engine: Engine,
}

impl Fixture {
    /// Opens an engine with the default storage settings and `planner`.
    pub fn new(planner: PlannerConfig) -> QuarryResult<Self> {
        let dir = TempDir::new()?;
        let mut config = EngineConfig::with_data_dir(dir.path());
        config.output_path = dir.path().join("bench.out");
        config.planner = planner;
        let engine = Engine::open(config)?;
        Ok(Self { dir, engine })
    }

    /// The engine under test.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Scratch directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Creates and loads table `name` with generated rows.
    pub fn table(&self, name: &str, count: usize, key_range: i32, seed: u64) -> QuarryResult<()> {
        self.engine.create_table(name, "k:int, v:int, s:string")?;
        let rows = self.write(&format!("{name}.tbl"), &generate_rows(count, key_range, seed))?;
        self.engine.load_table(name, rows)?;
        Ok(())
    }

    /// Builds an index on `table.attribute`.
    pub fn index(&self, table: &str, attribute: &str) -> QuarryResult<()> {
        self.engine.build_index(table, attribute)?;
        Ok(())
    }

    fn write(&self, name: &str, text: &str) -> QuarryResult<PathBuf> {
        let path = self.dir.path().join(name);
        std::fs::write(&path, text)?;
        Ok(path)
    }
}
