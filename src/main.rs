// Demo driver: generate a random batch, run the soft top-k operator, and
// report how tightly the per-row soft counts track the target k.

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array2, Axis};
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;
use plotters::prelude::*;
use rand::prelude::*;
use serde::Serialize;
use std::fs::File;

use soft_topk::soft_topk_f64;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let rows = 32;
    let n = 128;
    let k = 16.0;

    let mut rng = StdRng::seed_from_u64(42);
    let x = Array2::random_using((rows, n), Normal::new(0.0, 1.0)?, &mut rng);

    let p = soft_topk_f64(&x, k);
    println!("per-row soft counts at k = {}:", k);
    for (i, row) in p.axis_iter(Axis(0)).enumerate() {
        println!("  row {:2}: {:.6}", i, row.sum());
    }

    // Sweep the interior k range and record the worst per-row drift.
    let ks: Vec<f64> = (1..n).map(|kk| kk as f64).collect();
    let pb = ProgressBar::new(ks.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} k {msg}")?
            .progress_chars("█▇▆▅▃▂▁  "),
    );
    let mut drift = Vec::with_capacity(ks.len());
    for &kk in &ks {
        let scores = soft_topk_f64(&x, kk);
        let worst = scores
            .axis_iter(Axis(0))
            .map(|r| (r.sum() - kk).abs())
            .fold(0.0f64, f64::max);
        drift.push(worst);
        pb.set_message(format!("{}: worst drift {:.2e}", kk, worst));
        pb.inc(1);
    }
    pb.finish_with_message("sweep complete");

    plot_drift(&ks, &drift, "soft_count_drift.svg")?;
    save_scores(&x, &p, k, "soft_topk_scores.json")?;
    println!("wrote soft_count_drift.svg and soft_topk_scores.json");
    Ok(())
}

/// Plot the worst per-row soft-count drift against the target k.
fn plot_drift(ks: &[f64], drift: &[f64], filename: &str) -> Result<(), Box<dyn std::error::Error>> {
    let root = SVGBackend::new(filename, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let max_y = drift.iter().cloned().fold(f64::EPSILON, f64::max);
    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Worst per-row soft-count drift vs k",
            ("sans-serif", 20).into_font().color(&BLACK),
        )
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(ks[0]..*ks.last().unwrap(), 0f64..max_y * 1.1)?;
    chart.configure_mesh().draw()?;
    chart
        .draw_series(LineSeries::new(
            ks.iter().zip(drift.iter()).map(|(&x, &y)| (x, y)),
            ShapeStyle::from(&RED).stroke_width(2),
        ))?
        .label("worst drift")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));
    chart.configure_series_labels().border_style(&BLACK).draw()?;
    Ok(())
}

/// Dump one row's inputs and scores to JSON for inspection.
fn save_scores(
    x: &Array2<f64>,
    p: &Array2<f64>,
    k: f64,
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    #[derive(Serialize)]
    struct Scores {
        k: f64,
        values: Vec<f64>,
        scores: Vec<f64>,
    }
    let scores = Scores {
        k,
        values: x.row(0).to_vec(),
        scores: p.row(0).to_vec(),
    };
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &scores)?;
    Ok(())
}
