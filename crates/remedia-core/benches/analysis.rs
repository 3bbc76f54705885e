use criterion::{black_box, criterion_group, criterion_main, Criterion};

use remedia_core::analysis::analyze;
use remedia_core::classify::Thresholds;
use remedia_core::reducer::reduce;
use remedia_core::schema::{self, AliasTable};
use remedia_core::table::AssessmentTable;
use remedia_core::topics::TopicCatalog;

/// `students` × `questions` rows, every second question attempted twice.
fn make_table(students: usize, questions: usize) -> AssessmentTable {
    let mut rows = Vec::with_capacity(students * questions * 3 / 2);
    for s in 0..students {
        for q in 0..questions {
            let email = format!("student{s}@example.org");
            let question = format!("Q{q}");
            let status = if (s + q) % 3 == 0 { "Wrong" } else { "Correct" };
            rows.push(vec![
                format!("2024-05-01 10:{:02}:00", q % 60),
                email.clone(),
                question.clone(),
                status.to_string(),
            ]);
            if q % 2 == 0 {
                rows.push(vec![
                    format!("2024-05-02 10:{:02}:00", q % 60),
                    email,
                    question,
                    "Correct".to_string(),
                ]);
            }
        }
    }
    AssessmentTable::new(["Submitted At", "Email", "Question ID", "Answer Status"], rows)
}

fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze");
    let aliases = AliasTable::default();
    let thresholds = Thresholds::default();

    for (students, questions) in [(30, 10), (300, 20), (2000, 25)] {
        let table = make_table(students, questions);
        group.bench_function(format!("{students}x{questions}"), |b| {
            b.iter(|| analyze(black_box(&table), &aliases, &thresholds))
        });
    }

    group.finish();
}

fn bench_reduce(c: &mut Criterion) {
    let table = make_table(300, 20);
    let Ok(schema) = schema::resolve(&table.headers, &AliasTable::default()) else {
        return;
    };
    let records = schema.records(&table);

    c.bench_function("reduce 300x20", |b| b.iter(|| reduce(black_box(&records))));
}

fn bench_topics(c: &mut Criterion) {
    let catalog = TopicCatalog::default();
    let question = "<p>Which of the following is a traditional <b>dharamshala</b><COMMA> \
                    found near temples?</p> Select the correct option. A) B) C)";

    c.bench_function("topic_for", |b| {
        b.iter(|| catalog.topic_for(black_box(question)))
    });
}

criterion_group!(benches, bench_analyze, bench_reduce, bench_topics);
criterion_main!(benches);
