use serde_json::{Map, Value};

use graphrag_config::Postgres;
use graphrag_storage::{
	authority,
	db::Db,
	graph,
	keyword::{self, KeywordQuery},
	models::{CallerProfileRow, SearchProfileRow},
	profiles,
};
use graphrag_testkit::TestDatabase;

async fn bootstrap(test_db: &TestDatabase) -> Db {
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");
	// Bootstrap must be idempotent.
	db.ensure_schema().await.expect("Failed to re-run schema.");

	db
}

async fn insert_node(db: &Db, node_id: &str, name: &str, node_type: &str) {
	sqlx::query(
		"\
INSERT INTO graph_nodes (node_id, name, name_norm, node_type, chunk_id, content, source_id)
VALUES ($1, $2, lower($2), $3, $4, $5, 'kb')",
	)
	.bind(node_id)
	.bind(name)
	.bind(node_type)
	.bind(format!("chunk-{node_id}"))
	.bind(format!("{name} content"))
	.execute(&db.pool)
	.await
	.expect("Failed to insert node.");
}

async fn insert_edge(db: &Db, edge_id: &str, from: &str, to: &str, edge_type: &str) {
	sqlx::query("INSERT INTO graph_edges (edge_id, from_node, to_node, edge_type) VALUES ($1, $2, $3, $4)")
		.bind(edge_id)
		.bind(from)
		.bind(to)
		.bind(edge_type)
		.execute(&db.pool)
		.await
		.expect("Failed to insert edge.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set GRAPHRAG_PG_DSN to run."]
async fn keyword_search_ranks_and_filters() {
	let Some(base_dsn) = graphrag_testkit::env_dsn() else {
		eprintln!("Skipping keyword_search_ranks_and_filters; set GRAPHRAG_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;

	for (chunk_id, text, metadata) in [
		("c1", "Pembrolizumab improved survival in melanoma patients.", r#"{"region":"us"}"#),
		("c2", "Melanoma incidence rose in northern regions.", r#"{"region":"eu"}"#),
		("c3", "Unrelated cardiology note.", r#"{"region":"us"}"#),
	] {
		sqlx::query(
			"INSERT INTO chunks (chunk_id, text, source_id, metadata) VALUES ($1, $2, 'pubmed', $3::jsonb)",
		)
		.bind(chunk_id)
		.bind(text)
		.bind(metadata)
		.execute(&db.pool)
		.await
		.expect("Failed to insert chunk.");
	}

	let no_filter = Map::new();
	let hits = keyword::search_chunks(&db.pool, &KeywordQuery {
		text_search_config: "english",
		query: "melanoma",
		limit: 10,
		min_rank: 0.0,
		filter: &no_filter,
	})
	.await
	.expect("Keyword search failed.");
	let ids: Vec<&str> = hits.iter().map(|hit| hit.chunk_id.as_str()).collect();

	assert_eq!(ids.len(), 2);
	assert!(!ids.contains(&"c3"));

	let mut region = Map::new();

	region.insert("region".to_string(), Value::from("eu"));

	let hits = keyword::search_chunks(&db.pool, &KeywordQuery {
		text_search_config: "english",
		query: "melanoma",
		limit: 10,
		min_rank: 0.0,
		filter: &region,
	})
	.await
	.expect("Filtered keyword search failed.");

	assert_eq!(hits.len(), 1);
	assert_eq!(hits[0].chunk_id, "c2");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set GRAPHRAG_PG_DSN to run."]
async fn graph_queries_respect_type_filters() {
	let Some(base_dsn) = graphrag_testkit::env_dsn() else {
		eprintln!("Skipping graph_queries_respect_type_filters; set GRAPHRAG_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;

	insert_node(&db, "n1", "Keytruda", "drug").await;
	insert_node(&db, "n2", "Melanoma", "disease").await;
	insert_node(&db, "n3", "Merck", "organization").await;
	insert_edge(&db, "e1", "n1", "n2", "treats").await;
	insert_edge(&db, "e2", "n3", "n1", "manufactures").await;

	let seeds = graph::find_node_ids(&db.pool, "keytruda", Some("drug"), &[], 3)
		.await
		.expect("Seed lookup failed.");

	assert_eq!(seeds, vec!["n1"]);

	let wrong_type = graph::find_node_ids(&db.pool, "keytruda", Some("gene"), &[], 3)
		.await
		.expect("Seed lookup failed.");

	assert!(wrong_type.is_empty());

	let all_edges = graph::list_edges_touching(&db.pool, &seeds, &[], &[], 10)
		.await
		.expect("Edge lookup failed.");

	assert_eq!(all_edges.len(), 2);

	let treats_only =
		graph::list_edges_touching(&db.pool, &seeds, &["treats".to_string()], &[], 10)
			.await
			.expect("Edge lookup failed.");

	assert_eq!(treats_only.len(), 1);
	assert_eq!(treats_only[0].to_node, "n2");

	let drug_and_org = graph::list_edges_touching(
		&db.pool,
		&seeds,
		&[],
		&["drug".to_string(), "organization".to_string()],
		10,
	)
	.await
	.expect("Edge lookup failed.");

	assert_eq!(drug_and_org.len(), 1);
	assert_eq!(drug_and_org[0].edge_id, "e2");

	let nodes = graph::list_nodes(&db.pool, &["n1".to_string(), "n2".to_string()], &Map::new())
		.await
		.expect("Node lookup failed.");

	assert_eq!(nodes.len(), 2);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set GRAPHRAG_PG_DSN to run."]
async fn profiles_and_weights_round_trip_through_tables() {
	let Some(base_dsn) = graphrag_testkit::env_dsn() else {
		eprintln!("Skipping profiles_and_weights_round_trip_through_tables; set GRAPHRAG_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let profile = SearchProfileRow {
		profile_id: "analyst".to_string(),
		vector_enabled: true,
		keyword_enabled: true,
		graph_enabled: true,
		top_k: 20,
		similarity_threshold: 0.5,
		context_token_budget: 6_000,
		rerank_enabled: true,
		rerank_model_id: Some("rerank-v3.5".to_string()),
		vector_weight: 0.5,
		keyword_weight: 0.3,
		graph_weight: 0.2,
	};

	profiles::upsert_search_profile(&db.pool, &profile).await.expect("Failed to upsert profile.");
	profiles::upsert_caller_profile(&db.pool, &CallerProfileRow {
		caller_id: "agent-7".to_string(),
		default_profile_id: Some("analyst".to_string()),
		overrides: serde_json::json!({ "top_k": 5 }),
		view_node_types: Some(vec!["drug".to_string()]),
		view_edge_types: None,
		view_max_hops: Some(1),
		view_max_results: None,
	})
	.await
	.expect("Failed to upsert caller.");

	let stored = profiles::get_search_profile(&db.pool, "analyst")
		.await
		.expect("Profile lookup failed.")
		.expect("Profile must exist.");

	assert_eq!(stored.top_k, 20);
	assert_eq!(stored.rerank_model_id.as_deref(), Some("rerank-v3.5"));

	let caller = profiles::get_caller_profile(&db.pool, "agent-7")
		.await
		.expect("Caller lookup failed.")
		.expect("Caller must exist.");

	assert_eq!(caller.default_profile_id.as_deref(), Some("analyst"));
	assert_eq!(caller.view_node_types, Some(vec!["drug".to_string()]));
	assert!(profiles::get_caller_profile(&db.pool, "nobody").await.expect("Lookup failed.").is_none());

	authority::upsert_source_weight(&db.pool, "fda", 1.0).await.expect("Failed to upsert weight.");
	authority::upsert_document_type_weight(&db.pool, "label", 0.9)
		.await
		.expect("Failed to upsert weight.");

	let sources = authority::list_source_weights(&db.pool).await.expect("Weight read failed.");
	let types = authority::list_document_type_weights(&db.pool).await.expect("Weight read failed.");

	assert_eq!(sources.len(), 1);
	assert_eq!(sources[0].key, "fda");
	assert!((types[0].weight - 0.9).abs() < 1e-12);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
