// A period store kept in a JSON file.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use member_scoring::store::*;

use crate::report::*;

const STORE_VERSION: u32 = 1;

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
struct MemberRowJs {
    #[serde(rename = "firstName")]
    first_name: String,
    #[serde(rename = "lastName")]
    last_name: String,
    p: f64,
    a: f64,
    l: f64,
    m: f64,
    s: f64,
    rgi: f64,
    rgo: f64,
    rri: f64,
    rro: f64,
    v: f64,
    #[serde(rename = "oneToOne")]
    one_to_one: f64,
    tyfcb: f64,
    ceu: f64,
    t: f64,
    #[serde(rename = "trainingCount", default)]
    training_count: Option<u32>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
struct PeriodJs {
    start: NaiveDate,
    end: NaiveDate,
    #[serde(rename = "batchId")]
    batch_id: u64,
    source: String,
    #[serde(rename = "trainingSource", default)]
    training_source: Option<String>,
    #[serde(rename = "trainingStart", default)]
    training_start: Option<NaiveDate>,
    #[serde(rename = "trainingEnd", default)]
    training_end: Option<NaiveDate>,
    rows: Vec<MemberRowJs>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
struct StoreJs {
    version: u32,
    periods: Vec<PeriodJs>,
}

impl MemberRowJs {
    fn from_row(row: &PeriodRow) -> MemberRowJs {
        let r = &row.record;
        MemberRowJs {
            first_name: r.first_name.clone(),
            last_name: r.last_name.clone(),
            p: r.p,
            a: r.a,
            l: r.l,
            m: r.m,
            s: r.s,
            rgi: r.rgi,
            rgo: r.rgo,
            rri: r.rri,
            rro: r.rro,
            v: r.v,
            one_to_one: r.one_to_one,
            tyfcb: r.tyfcb,
            ceu: r.ceu,
            t: r.t,
            training_count: row.training_count,
        }
    }

    fn to_row(&self) -> PeriodRow {
        PeriodRow {
            record: MemberRecord {
                first_name: self.first_name.clone(),
                last_name: self.last_name.clone(),
                p: self.p,
                a: self.a,
                l: self.l,
                m: self.m,
                s: self.s,
                rgi: self.rgi,
                rgo: self.rgo,
                rri: self.rri,
                rro: self.rro,
                v: self.v,
                one_to_one: self.one_to_one,
                tyfcb: self.tyfcb,
                ceu: self.ceu,
                t: self.t,
            },
            training_count: self.training_count,
        }
    }
}

impl PeriodJs {
    fn from_stored(sp: &StoredPeriod) -> PeriodJs {
        PeriodJs {
            start: sp.period.start(),
            end: sp.period.end(),
            batch_id: sp.batch.id,
            source: sp.batch.source.clone(),
            training_source: sp.batch.training_source.clone(),
            training_start: sp.batch.training_period.map(|p| p.start()),
            training_end: sp.batch.training_period.map(|p| p.end()),
            rows: sp.rows.iter().map(MemberRowJs::from_row).collect(),
        }
    }

    fn to_stored(&self, path: &str) -> ReportResult<StoredPeriod> {
        let period = ReportingPeriod::new(self.start, self.end).context(CorruptStoreSnafu {
            path,
            batch_id: self.batch_id,
        })?;
        let training_period = match (self.training_start, self.training_end) {
            (Some(s), Some(e)) => ReportingPeriod::new(s, e).ok(),
            _ => None,
        };
        Ok(StoredPeriod {
            period,
            batch: UploadBatch {
                id: self.batch_id,
                source: self.source.clone(),
                training_source: self.training_source.clone(),
                training_period,
            },
            rows: self.rows.iter().map(|r| r.to_row()).collect(),
        })
    }
}

/// A repository persisted as a single JSON file.
///
/// The changes are kept in memory until [JsonFileStore::save] is called. The
/// file is replaced atomically: the content is written to a temporary file
/// next to it, which is then renamed.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: String,
    inner: InMemoryRepository,
}

impl JsonFileStore {
    /// Opens the store at `path`. A missing file is an empty store.
    pub fn open(path: &str) -> ReportResult<JsonFileStore> {
        if !Path::new(path).exists() {
            info!("JsonFileStore::open: {:?} does not exist, starting empty", path);
            return Ok(JsonFileStore {
                path: path.to_string(),
                inner: InMemoryRepository::new(),
            });
        }
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
        let js: StoreJs = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        if js.version != STORE_VERSION {
            whatever!(
                "Unsupported store version {} in {} (expected {})",
                js.version,
                path,
                STORE_VERSION
            )
        }
        let mut periods: Vec<StoredPeriod> = Vec::new();
        for p in js.periods.iter() {
            periods.push(p.to_stored(path)?);
        }
        info!(
            "JsonFileStore::open: {:?}: {} periods",
            path,
            periods.len()
        );
        Ok(JsonFileStore {
            path: path.to_string(),
            inner: InMemoryRepository::from_periods(periods),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn save(&self) -> ReportResult<()> {
        let js = StoreJs {
            version: STORE_VERSION,
            periods: self
                .inner
                .periods()
                .iter()
                .map(PeriodJs::from_stored)
                .collect(),
        };
        let contents = serde_json::to_string_pretty(&js).context(ParsingJsonSnafu {})?;
        let tmp_path = format!("{}.tmp", self.path);
        fs::write(&tmp_path, contents).context(WritingStoreSnafu {
            path: tmp_path.clone(),
        })?;
        fs::rename(&tmp_path, &self.path).context(WritingStoreSnafu {
            path: self.path.clone(),
        })?;
        debug!("JsonFileStore::save: {:?}: {} periods", self.path, js.periods.len());
        Ok(())
    }
}

impl PeriodRepository for JsonFileStore {
    fn replace_period(
        &mut self,
        period: ReportingPeriod,
        batch: UploadBatch,
        rows: Vec<PeriodRow>,
    ) -> Result<SaveReport, ScoringErrors> {
        self.inner.replace_period(period, batch, rows)
    }

    fn periods(&self) -> Vec<StoredPeriod> {
        self.inner.periods()
    }

    fn remove_period(&mut self, period: &ReportingPeriod) -> bool {
        self.inner.remove_period(period)
    }

    fn clear(&mut self) {
        self.inner.clear()
    }
}
