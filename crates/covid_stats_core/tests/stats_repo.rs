use covid_stats_core::db::open_db_in_memory;
use covid_stats_core::{
    DeathCounts, RepoError, SqliteStatsRepository, StatsRepository, StoreCounts,
    UnemploymentRates,
};

fn rates(national: f64) -> UnemploymentRates {
    UnemploymentRates {
        national: Some(national),
        male: Some(national - 0.2),
        female: Some(national + 0.2),
    }
}

fn counts(total: i64, covid: i64) -> DeathCounts {
    DeathCounts {
        total: Some(total),
        covid: Some(covid),
        other: Some(total - covid),
    }
}

#[test]
fn year_insert_and_find_roundtrip() {
    let conn = open_db_in_memory().expect("in-memory db should open");
    let repo = SqliteStatsRepository::new(&conn);

    assert!(repo.find_year(2020).expect("find year should succeed").is_none());
    let id = repo.insert_year(2020).expect("insert year should succeed");

    let found = repo.find_year(2020).expect("find year should succeed").expect("row should exist");
    assert_eq!(found.id, id);
    assert_eq!(found.value, 2020);
}

#[test]
fn duplicate_year_value_is_rejected() {
    let conn = open_db_in_memory().expect("in-memory db should open");
    let repo = SqliteStatsRepository::new(&conn);

    repo.insert_year(2020).expect("insert year should succeed");
    let err = repo.insert_year(2020).expect_err("insert year should fail");
    assert!(matches!(err, RepoError::Db(_)));
}

#[test]
fn list_years_orders_by_value() {
    let conn = open_db_in_memory().expect("in-memory db should open");
    let repo = SqliteStatsRepository::new(&conn);
    repo.insert_year(2022).expect("insert year should succeed");
    repo.insert_year(2020).expect("insert year should succeed");
    repo.insert_year(2021).expect("insert year should succeed");

    let values: Vec<i32> = repo
        .list_years()
        .expect("list years should succeed")
        .into_iter()
        .map(|row| row.value)
        .collect();
    assert_eq!(values, vec![2020, 2021, 2022]);
}

#[test]
fn months_are_unique_per_year_and_listed_in_insertion_order() {
    let conn = open_db_in_memory().expect("in-memory db should open");
    let repo = SqliteStatsRepository::new(&conn);
    let year_2020 = repo.insert_year(2020).expect("insert year should succeed");
    let year_2021 = repo.insert_year(2021).expect("insert year should succeed");

    repo.insert_month(year_2020, "March", &rates(5.4)).expect("insert month should succeed");
    repo.insert_month(year_2020, "January", &rates(5.5)).expect("insert month should succeed");
    repo.insert_month(year_2021, "January", &rates(6.5)).expect("insert month should succeed");
    assert!(repo.insert_month(year_2020, "March", &rates(1.0)).is_err());

    let names: Vec<String> = repo
        .list_months_for_year(year_2020)
        .expect("list months for year should succeed")
        .into_iter()
        .map(|row| row.name)
        .collect();
    assert_eq!(names, vec!["March".to_string(), "January".to_string()]);

    let january_2021 = repo.find_month(year_2021, "January")
        .expect("find month should succeed")
        .expect("row should exist");
    assert_eq!(january_2021.rates.national, Some(6.5));
}

#[test]
fn update_month_overwrites_rates_including_nulls() {
    let conn = open_db_in_memory().expect("in-memory db should open");
    let repo = SqliteStatsRepository::new(&conn);
    let year_id = repo.insert_year(2020).expect("insert year should succeed");
    let month_id = repo.insert_month(year_id, "April", &rates(5.8))
        .expect("insert month should succeed");

    let updated = UnemploymentRates {
        national: Some(6.0),
        male: None,
        female: Some(6.4),
    };
    repo.update_month(month_id, &updated).expect("update month should succeed");

    let loaded = repo.find_month(year_id, "April")
        .expect("find month should succeed")
        .expect("row should exist");
    assert_eq!(loaded.id, month_id);
    assert_eq!(loaded.rates, updated);
}

#[test]
fn update_missing_rows_returns_not_found() {
    let conn = open_db_in_memory().expect("in-memory db should open");
    let repo = SqliteStatsRepository::new(&conn);

    let err = repo.update_month(99, &rates(1.0)).expect_err("update month should fail");
    assert!(matches!(
        err,
        RepoError::NotFound {
            table: "unemployment",
            id: 99
        }
    ));

    let err = repo.update_death(7, &counts(1, 0)).expect_err("update death should fail");
    assert!(matches!(
        err,
        RepoError::NotFound {
            table: "deaths",
            id: 7
        }
    ));
}

#[test]
fn death_row_is_one_to_one_with_month() {
    let conn = open_db_in_memory().expect("in-memory db should open");
    let repo = SqliteStatsRepository::new(&conn);
    let year_id = repo.insert_year(2020).expect("insert year should succeed");
    let month_id = repo.insert_month(year_id, "May", &rates(6.0))
        .expect("insert month should succeed");

    assert!(repo
        .find_death_for_month(month_id)
        .expect("find death for month should succeed")
        .is_none());
    let death_id = repo.insert_death(month_id, &counts(32000, 260))
        .expect("insert death should succeed");
    assert!(repo.insert_death(month_id, &counts(1, 1)).is_err());

    repo.update_death(death_id, &counts(33000, 300)).expect("update death should succeed");
    let loaded = repo.find_death_for_month(month_id)
        .expect("find death for month should succeed")
        .expect("row should exist");
    assert_eq!(loaded.id, death_id);
    assert_eq!(loaded.counts, counts(33000, 300));
}

#[test]
fn deleting_year_cascades_to_months_and_deaths() {
    let conn = open_db_in_memory().expect("in-memory db should open");
    let repo = SqliteStatsRepository::new(&conn);
    let year_2020 = repo.insert_year(2020).expect("insert year should succeed");
    let year_2021 = repo.insert_year(2021).expect("insert year should succeed");
    let month_2020 = repo.insert_month(year_2020, "June", &rates(6.1))
        .expect("insert month should succeed");
    let month_2021 = repo.insert_month(year_2021, "June", &rates(5.9))
        .expect("insert month should succeed");
    repo.insert_death(month_2020, &counts(30000, 100)).expect("insert death should succeed");
    repo.insert_death(month_2021, &counts(31000, 900)).expect("insert death should succeed");

    assert!(repo.delete_year(2020).expect("delete year should succeed"));
    assert!(!repo.delete_year(2020).expect("delete year should succeed"));

    assert_eq!(
        repo.row_counts().expect("row counts should load"),
        StoreCounts {
            years: 1,
            months: 1,
            deaths: 1,
        }
    );
    assert!(repo
        .find_death_for_month(month_2021)
        .expect("find death for month should succeed")
        .is_some());
}
