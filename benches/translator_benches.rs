use RustedEqBench::discovery::equation::parse_equation;
use RustedEqBench::discovery::translator::{
    ConstantHandling, CorrespondenceTable, FactorUniverse, SindyTranslator,
};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn lotka_volterra_translator() -> SindyTranslator {
    let table = CorrespondenceTable::new([("0", "u"), ("0_1", "du/dx1"), ("1", "v"), ("1_1", "dv/dx1")]);
    SindyTranslator::new(table, &FactorUniverse::polynomial(2), ConstantHandling::Leading, "x1").unwrap()
}

fn bench_translate_system(c: &mut Criterion) {
    let translator = lotka_volterra_translator();
    let equations = vec![
        "0.012 1 + 19.987 x0 + -19.991 x0 x1".to_string(),
        "-0.004 1 + -20.003 x1 + 20.001 x0 x1".to_string(),
    ];
    let names = vec!["u".to_string(), "v".to_string()];
    c.bench_function("translate LV system", |b| {
        b.iter(|| translator.translate_system(black_box(&equations), black_box(&names)))
    });
}

fn bench_parse_equation(c: &mut Criterion) {
    let text = "0.1 * d^2u/dx2^2{power: 1.0} + 1.0 * u{power: 1.0} * du/dx2{power: 1.0} + 0.0 = du/dx1{power: 1.0}";
    c.bench_function("parse Burgers equation", |b| b.iter(|| parse_equation(black_box(text))));
}

criterion_group!(benches, bench_translate_system, bench_parse_equation);
criterion_main!(benches);
