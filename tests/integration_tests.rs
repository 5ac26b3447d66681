use dashmap::DashMap;
use geocell::geometry::{make_circle, make_line_string, make_point, make_rectangle};
use geocell::{
    Config, CoverageConfig, DocId, GeohashTreeStrategy, Geometry, MemoryIndex, Point,
    SpatialIndexReader, SpatialRelation,
};
use roaring::RoaringBitmap;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn strategy(config: Config) -> GeohashTreeStrategy {
    GeohashTreeStrategy::new(config).expect("valid config")
}

fn index_shapes(strategy: &GeohashTreeStrategy, shapes: &[Geometry]) -> (MemoryIndex, Vec<DocId>) {
    let mut index = MemoryIndex::new();
    let docs = shapes
        .iter()
        .map(|shape| {
            let fields = strategy
                .create_indexable_fields(shape)
                .expect("Failed to build fields");
            index.add_document(fields).expect("Failed to add document")
        })
        .collect();
    (index, docs)
}

fn query(
    strategy: &GeohashTreeStrategy,
    index: &MemoryIndex,
    shape: Geometry,
    relation: SpatialRelation,
) -> Vec<DocId> {
    strategy
        .make_filter(shape, relation)
        .expect("Failed to build filter")
        .evaluate(index)
        .expect("Evaluation failed")
        .iter()
        .collect()
}

/// Reader that counts stored shape lookups per document.
struct CountingReader {
    inner: MemoryIndex,
    loads: DashMap<DocId, usize>,
}

impl CountingReader {
    fn new(inner: MemoryIndex) -> Self {
        Self {
            inner,
            loads: DashMap::new(),
        }
    }

    fn loads(&self, doc: DocId) -> usize {
        self.loads.get(&doc).map(|n| *n).unwrap_or(0)
    }
}

impl SpatialIndexReader for CountingReader {
    fn terms(&self, field: &str) -> geocell::Result<Box<dyn Iterator<Item = bytes::Bytes> + '_>> {
        self.inner.terms(field)
    }

    fn postings(&self, field: &str, term: &[u8]) -> geocell::Result<RoaringBitmap> {
        self.inner.postings(field, term)
    }

    fn stored_value(&self, doc: DocId, field: &str) -> geocell::Result<Option<String>> {
        *self.loads.entry(doc).or_insert(0) += 1;
        self.inner.stored_value(doc, field)
    }

    fn docs_with_field(&self, field: &str) -> geocell::Result<RoaringBitmap> {
        self.inner.docs_with_field(field)
    }
}

#[test]
fn test_square_end_to_end() {
    init_logging();
    let strategy = strategy(Config::default());
    let (index, docs) = index_shapes(&strategy, &[make_rectangle(0.0, 0.0, 1.0, 1.0)]);
    let square = docs[0];

    assert_eq!(
        query(&strategy, &index, make_point(0.5, 0.5), SpatialRelation::Contains),
        vec![square]
    );
    assert!(query(&strategy, &index, make_point(5.0, 5.0), SpatialRelation::Contains).is_empty());
    assert_eq!(
        query(
            &strategy,
            &index,
            make_rectangle(0.9, 0.9, 1.9, 1.9),
            SpatialRelation::Intersects
        ),
        vec![square]
    );
    assert!(
        query(
            &strategy,
            &index,
            make_rectangle(10.0, 10.0, 11.0, 11.0),
            SpatialRelation::Intersects
        )
        .is_empty()
    );
}

#[test]
fn test_square_end_to_end_multi_resolution() {
    init_logging();
    let config =
        Config::default().with_coverage(CoverageConfig::default().multi_resolution(2, 4));
    let strategy = strategy(config);
    let (index, docs) = index_shapes(&strategy, &[make_rectangle(0.0, 0.0, 1.0, 1.0)]);

    assert_eq!(
        query(&strategy, &index, make_point(0.5, 0.5), SpatialRelation::Contains),
        docs
    );
    assert_eq!(
        query(
            &strategy,
            &index,
            make_rectangle(0.9, 0.9, 1.9, 1.9),
            SpatialRelation::Intersects
        ),
        docs
    );
    assert!(
        query(
            &strategy,
            &index,
            make_rectangle(10.0, 10.0, 11.0, 11.0),
            SpatialRelation::Intersects
        )
        .is_empty()
    );
}

#[test]
fn test_document_refined_at_most_once() {
    init_logging();
    let strategy = strategy(Config::default());
    let (index, docs) = index_shapes(&strategy, &[make_rectangle(0.0, 0.0, 1.0, 1.0)]);
    let reader = CountingReader::new(index);

    // overlaps the cells along the square's right and bottom edges
    let filter = strategy
        .make_filter(
            make_rectangle(0.9, -0.5, 1.5, 1.5),
            SpatialRelation::Intersects,
        )
        .unwrap();
    let (hits, stats) = filter.evaluate_with_stats(&reader).unwrap();

    assert!(hits.contains(docs[0]));
    assert!(stats.terms_refined >= 2, "stats: {:?}", stats);
    assert_eq!(stats.refinements, 1);
    assert_eq!(reader.loads(docs[0]), 1);
}

#[test]
fn test_relation_matrix() {
    init_logging();
    let strategy = strategy(Config::default());
    let shapes = [
        make_rectangle(0.0, 0.0, 1.0, 1.0),
        make_rectangle(0.2, 0.2, 0.4, 0.4),
        make_rectangle(-2.0, -2.0, 3.0, 3.0),
        make_rectangle(5.0, 5.0, 6.0, 6.0),
        make_point(0.7, 0.3),
        make_line_string(&[(0.5, 0.5), (2.0, 0.5)]),
    ];
    let (index, docs) = index_shapes(&strategy, &shapes);
    let q = make_rectangle(0.0, 0.0, 1.0, 1.0);

    let within = query(&strategy, &index, q.clone(), SpatialRelation::Within);
    assert_eq!(within, vec![docs[0], docs[1], docs[4]]);

    let intersects = query(&strategy, &index, q.clone(), SpatialRelation::Intersects);
    assert_eq!(intersects, vec![docs[0], docs[1], docs[2], docs[4], docs[5]]);

    let contains = query(&strategy, &index, q.clone(), SpatialRelation::Contains);
    assert_eq!(contains, vec![docs[0], docs[2]]);

    let disjoint = query(&strategy, &index, q, SpatialRelation::Disjoint);
    assert_eq!(disjoint, vec![docs[3]]);
}

#[test]
fn test_large_document_small_query() {
    init_logging();
    let config =
        Config::default().with_coverage(CoverageConfig::default().multi_resolution(2, 4));
    let strategy = strategy(config);
    let (index, docs) = index_shapes(&strategy, &[make_rectangle(0.0, 0.0, 30.0, 30.0)]);
    let small = make_rectangle(10.0, 10.0, 10.5, 10.5);

    assert_eq!(
        query(&strategy, &index, small.clone(), SpatialRelation::Intersects),
        docs
    );
    assert_eq!(
        query(&strategy, &index, small.clone(), SpatialRelation::Contains),
        docs
    );
    assert!(query(&strategy, &index, small.clone(), SpatialRelation::Within).is_empty());
    assert!(query(&strategy, &index, small, SpatialRelation::Disjoint).is_empty());
}

#[test]
fn test_circle_query() {
    init_logging();
    let strategy = strategy(Config::default());
    let (index, docs) = index_shapes(
        &strategy,
        &[
            make_point(13.4050, 52.5200),
            make_point(13.3777, 52.5163),
            make_point(2.3522, 48.8566),
        ],
    );
    let circle = make_circle(Point::new(13.4050, 52.5200), 5.0, 64).unwrap();

    assert_eq!(
        query(&strategy, &index, circle, SpatialRelation::Within),
        vec![docs[0], docs[1]]
    );
}

#[test]
fn test_deleted_documents_never_match() {
    init_logging();
    let strategy = strategy(Config::default());
    let (mut index, docs) = index_shapes(
        &strategy,
        &[
            make_rectangle(0.0, 0.0, 1.0, 1.0),
            make_rectangle(0.0, 0.0, 1.0, 1.0),
        ],
    );
    assert!(index.delete_document(docs[0]));

    for relation in [SpatialRelation::Intersects, SpatialRelation::Contains] {
        assert_eq!(
            query(&strategy, &index, make_point(0.5, 0.5), relation),
            vec![docs[1]]
        );
    }
    assert!(
        query(
            &strategy,
            &index,
            make_point(0.5, 0.5),
            SpatialRelation::Disjoint
        )
        .is_empty()
    );
}

#[test]
fn test_contains_rejects_query_on_document_edge() {
    init_logging();
    let strategy = strategy(Config::default());
    let (index, _) = index_shapes(&strategy, &[make_rectangle(0.0, 0.0, 1.0, 1.0)]);
    let on_edge = make_point(0.0, 0.1);

    assert!(query(&strategy, &index, on_edge.clone(), SpatialRelation::Contains).is_empty());
    assert_eq!(
        query(&strategy, &index, on_edge, SpatialRelation::Intersects).len(),
        1
    );
}

#[test]
fn test_within_rejects_documents_on_query_edge() {
    init_logging();
    let strategy = strategy(Config::default());
    let (index, docs) = index_shapes(
        &strategy,
        &[
            make_point(0.0, 0.1),
            make_line_string(&[(0.0, 0.1), (0.0, 0.2)]),
            make_point(0.1, 0.1),
        ],
    );
    let square = make_rectangle(0.0, 0.0, 1.0, 1.0);

    assert_eq!(
        query(&strategy, &index, square.clone(), SpatialRelation::Within),
        vec![docs[2]]
    );
    assert_eq!(
        query(&strategy, &index, square, SpatialRelation::Intersects),
        docs
    );
}
