use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use storm_severity::config::PipelineConfig;
use storm_severity::output::{read_severity, read_table};
use storm_severity::pipeline::Pipeline;

const HEADER: &str = "BEGIN_YEARMONTH,BEGIN_DAY,BEGIN_TIME,END_YEARMONTH,END_DAY,END_TIME,EPISODE_ID,EVENT_ID,STATE,STATE_FIPS,YEAR,EVENT_TYPE,CZ_TYPE,CZ_FIPS,CZ_NAME,INJURIES_DIRECT,INJURIES_INDIRECT,DEATHS_DIRECT,DEATHS_INDIRECT,DAMAGE_PROPERTY,DAMAGE_CROPS,MAGNITUDE,MAGNITUDE_TYPE,TOR_F_SCALE,TOR_LENGTH,TOR_WIDTH,BEGIN_LAT,BEGIN_LON,END_LAT,END_LON";

const LAND: [(u32, u32, &str, &str); 3] = [
    (19, 169, "IOWA", "STORY"),
    (48, 201, "TEXAS", "HARRIS"),
    (40, 109, "OKLAHOMA", "OKLAHOMA"),
];

/// One year's details file: fourteen land events spread over three counties
/// plus two offshore events.
fn details_csv(year: i32) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for i in 0..14u32 {
        let (state_fips, cz_fips, state, cz_name) = LAND[(i % 3) as usize];
        let event_id = year as u32 * 100 + i;
        let row = match i % 4 {
            0 => format!(
                "{year}06,{day},1200,{year}06,{day},1330,1,{event_id},{state},{state_fips},{year},Thunderstorm Wind,C,{cz_fips},{cz_name},{inj},0,0,0,{dmg}K,0K,{mag},EG,,,,41.0,-93.0,41.1,-93.1",
                day = i + 1,
                inj = i % 3,
                dmg = 5 + i,
                mag = 50 + i,
            ),
            1 => format!(
                "{year}07,{day},1530,{year}07,{day},1545,2,{event_id},{state},{state_fips},{year},Hail,C,{cz_fips},{cz_name},0,0,0,0,{dmg}K,{crop}K,{mag},,,,,41.0,-93.0,,",
                day = i + 1,
                dmg = i,
                crop = i * 2,
                mag = 1.0 + f64::from(i) / 4.0,
            ),
            2 => format!(
                "{year}05,{day},0815,{year}05,{day},0900,3,{event_id},{state},{state_fips},{year},Tornado,C,{cz_fips},{cz_name},{inj},1,{deaths},0,{dmg}M,0K,,,EF{scale},{len},{width},35.0,-97.0,35.2,-97.1",
                day = i + 1,
                inj = 4 + i,
                deaths = i % 2,
                dmg = 1.0 + f64::from(i) / 2.0,
                scale = i % 5,
                len = 2.5 + f64::from(i),
                width = 100 + 10 * i,
            ),
            _ => format!(
                "{year}01,{day},2300,{year}01,{next},0600,4,{event_id},{state},{state_fips},{year},Winter Storm,Z,{cz_fips},{cz_name},0,{inj},0,0,0K,0K,,,,,,,,,",
                day = i + 1,
                next = i + 2,
                inj = i % 2,
            ),
        };
        out.push_str(&row);
        out.push('\n');
    }
    for i in 0..2u32 {
        let event_id = year as u32 * 100 + 50 + i;
        out.push_str(&format!(
            "{year}08,{day},1000,{year}08,{day},1100,5,{event_id},GULF OF MEXICO,85,{year},Marine Thunderstorm Wind,M,250,COASTAL WATERS,0,0,0,0,,,40,MG,,,,,,,\n",
            day = i + 1,
        ));
    }
    out
}

fn write_raw_files(root: &Path, years: &[i32]) {
    let raw_dir = root.join("data");
    fs::create_dir_all(&raw_dir).unwrap();
    for &year in years {
        let name = format!("StormEvents_details-ftp_v1.0_d{year}_c20210803.csv.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(details_csv(year).as_bytes()).unwrap();
        fs::write(raw_dir.join(name), encoder.finish().unwrap()).unwrap();
    }
}

fn test_config(root: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.data_dir = root.to_path_buf();
    config.first_year = 2018;
    config.last_year = 2020;
    config.workers = 2;
    config.cpu_limit_percent = None;
    config.clustering.clusters = 2;
    config.clustering.trials = 2;
    config.clustering.batch_size = None;
    config.clustering.seed = Some(7);
    config
}

#[test]
fn test_full_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let years = config.years();
    write_raw_files(dir.path(), &years);

    let pipeline = Pipeline::new(config).unwrap();
    let severity = pipeline.run(&years, false).unwrap();
    let layout = pipeline.layout();

    // Maritime events never survive cleaning.
    for &year in &years {
        let clean = read_table(&layout.clean_table(year)).unwrap();
        assert_eq!(clean.len(), 14);
        assert!(clean.iter().all(|r| r.cz_type != "M"));
    }
    assert!(!severity.contains_key("85250"));
    let expected_keys: Vec<&str> = vec!["19169", "40109", "48201"];
    assert_eq!(severity.keys().map(String::as_str).collect::<Vec<_>>(), expected_keys);

    // The severity table is the per-location sum of the labeled ranks.
    let mut summed: BTreeMap<String, f64> = BTreeMap::new();
    for &year in &years {
        for record in read_table(&layout.labeled_table(year)).unwrap() {
            let rank = record.rank.expect("labeled rows carry a rank");
            assert!(rank < 2);
            *summed.entry(record.fips).or_default() += f64::from(rank);
        }
    }
    assert_eq!(summed, severity);
    assert_eq!(read_severity(&layout.severity()).unwrap(), severity);
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();

    let mut results = Vec::new();
    for dir in [&first, &second] {
        let config = test_config(dir.path());
        let years = config.years();
        write_raw_files(dir.path(), &years);
        let pipeline = Pipeline::new(config).unwrap();
        results.push(pipeline.run(&years, false).unwrap());
    }
    assert_eq!(results[0], results[1]);
}

#[test]
fn test_cleaned_tables_are_reused_unless_forced() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let years = config.years();
    write_raw_files(dir.path(), &years);

    let pipeline = Pipeline::new(config).unwrap();
    let first = pipeline.preprocess(&years, false).unwrap();

    fs::remove_dir_all(dir.path().join("data")).unwrap();
    let second = pipeline.preprocess(&years, false).unwrap();
    assert_eq!(first, second);

    let err = pipeline.preprocess(&years, true).unwrap_err();
    assert!(format!("{err:#}").contains("no raw details file"));
}

#[test]
fn test_later_stages_require_earlier_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(test_config(dir.path())).unwrap();

    let mut rng = pipeline.rng();
    assert!(pipeline.cluster(&mut rng).is_err());
    assert!(pipeline.rank().is_err());
}

#[test]
fn test_failed_preprocess_leaves_no_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let years = config.years();
    write_raw_files(dir.path(), &years);

    let pipeline = Pipeline::new(config).unwrap();
    pipeline.preprocess(&years, false).unwrap();
    let layout = pipeline.layout();
    assert!(layout.statistics().exists());

    // A directory in place of the table makes the 2019 write fail.
    let blocked = layout.normalized_table(2019);
    fs::remove_file(&blocked).unwrap();
    fs::create_dir(&blocked).unwrap();

    let err = pipeline.preprocess(&years, true).unwrap_err();
    assert!(format!("{err:#}").contains("normalizing 2019"));
    assert!(!layout.statistics().exists());

    let mut rng = pipeline.rng();
    assert!(pipeline.cluster(&mut rng).is_err());
    assert!(pipeline.rank().is_err());
}
