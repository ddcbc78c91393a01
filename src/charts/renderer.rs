//! Static Chart Renderer
//! Writes PNG charts of the clean panel with plotters.
//!
//! Charts:
//! 1. Global e-commerce share trend with crisis markers
//! 2. Mean share by region
//! 3. Internet penetration vs e-commerce share per region (grouped bars)
//! 4. Share distribution before, during and after the pandemic (box plot)
//! 5. One dual-axis detail chart per region (share left, internet right)

use crate::config::{CrisisMarker, PipelineConfig};
use crate::data::PanelRow;
use crate::report::research::periods;
use crate::report::tables::{mean_of, RegionalRow};
use plotters::prelude::*;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

type DrawResult<T> = Result<T, Box<dyn std::error::Error>>;

const SIZE: (u32, u32) = (1200, 700);
const FONT: &str = "sans-serif";

const SHARE_COLOR: RGBColor = RGBColor(52, 152, 219); // Blue
const INTERNET_COLOR: RGBColor = RGBColor(46, 204, 113); // Green
const CRISIS_COLOR: RGBColor = RGBColor(231, 76, 60); // Red

const PALETTE: [RGBColor; 6] = [
    RGBColor(52, 152, 219),
    RGBColor(231, 76, 60),
    RGBColor(46, 204, 113),
    RGBColor(155, 89, 182),
    RGBColor(243, 156, 18),
    RGBColor(26, 188, 156),
];

pub struct ChartRenderer<'a> {
    config: &'a PipelineConfig,
    out_dir: PathBuf,
}

impl<'a> ChartRenderer<'a> {
    pub fn new(config: &'a PipelineConfig, out_dir: &Path) -> Self {
        Self {
            config,
            out_dir: out_dir.to_path_buf(),
        }
    }

    /// Render every chart. A chart that fails is logged and skipped;
    /// the paths of the charts written are returned.
    pub fn render_all(&self, rows: &[PanelRow], regional: &[RegionalRow]) -> Vec<PathBuf> {
        if let Err(e) = fs::create_dir_all(&self.out_dir) {
            log::warn!(
                "charts skipped, cannot create {}: {e}",
                self.out_dir.display()
            );
            return Vec::new();
        }

        let mut outcomes: Vec<(String, Result<PathBuf, String>)> = vec![
            (
                "global trend".to_string(),
                self.render("01_global_ecommerce_trend.png", |path| {
                    self.global_trend(rows, path)
                }),
            ),
            (
                "regional comparison".to_string(),
                self.render("02_regional_comparison.png", |path| {
                    Self::regional_share(regional, path)
                }),
            ),
            (
                "internet vs e-commerce".to_string(),
                self.render("03_internet_vs_ecommerce.png", |path| {
                    Self::internet_vs_ecommerce(regional, path)
                }),
            ),
            (
                "pandemic distribution".to_string(),
                self.render("04_pandemic_share_distribution.png", |path| {
                    self.period_boxplot(rows, path)
                }),
            ),
        ];

        let regions: Vec<&str> = regional.iter().map(|r| r.region.as_str()).collect();
        let details: Vec<(String, Result<PathBuf, String>)> = regions
            .par_iter()
            .map(|region| {
                let file = format!("region_{}.png", file_slug(region));
                (
                    format!("{region} detail"),
                    self.render(&file, |path| self.region_detail(rows, region, path)),
                )
            })
            .collect();
        outcomes.extend(details);

        let mut written = Vec::new();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(path) => {
                    log::debug!("chart '{name}' written to {}", path.display());
                    written.push(path);
                }
                Err(e) => log::warn!("chart '{name}' failed: {e}"),
            }
        }
        log::info!(
            "{} charts written to {}",
            written.len(),
            self.out_dir.display()
        );
        written
    }

    fn render(
        &self,
        file: &str,
        draw: impl FnOnce(&Path) -> DrawResult<()>,
    ) -> Result<PathBuf, String> {
        let path = self.out_dir.join(file);
        draw(&path).map_err(|e| e.to_string())?;
        Ok(path)
    }

    fn markers_between(&self, first: i32, last: i32) -> Vec<&CrisisMarker> {
        self.config
            .reporting
            .crisis_markers
            .iter()
            .filter(|m| (first..=last).contains(&m.year))
            .collect()
    }

    fn global_trend(&self, rows: &[PanelRow], path: &Path) -> DrawResult<()> {
        let points = yearly_mean(rows.iter(), |r| r.ecom_share_pct);
        let (Some(&(first, _)), Some(&(last, _))) = (points.first(), points.last()) else {
            return Err("no share observations".into());
        };
        let (y0, y1) = value_range(points.iter().map(|p| p.1));

        let root = BitMapBackend::new(path, SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Global E-commerce Share of Turnover", (FONT, 30))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d((first - 1)..(last + 1), y0..y1)?;
        chart
            .configure_mesh()
            .x_desc("Year")
            .y_desc("Mean share (%)")
            .draw()?;

        chart
            .draw_series(LineSeries::new(
                points.iter().copied(),
                SHARE_COLOR.stroke_width(3),
            ))?
            .label("Mean e-commerce share")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &SHARE_COLOR));
        chart.draw_series(
            points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 4, SHARE_COLOR.filled())),
        )?;

        for marker in self.markers_between(first, last) {
            chart
                .draw_series(LineSeries::new(
                    vec![(marker.year, y0), (marker.year, y1)],
                    CRISIS_COLOR.mix(0.6).stroke_width(2),
                ))?
                .label(marker.label.clone())
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &CRISIS_COLOR));
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
        root.present()?;
        Ok(())
    }

    fn regional_share(regional: &[RegionalRow], path: &Path) -> DrawResult<()> {
        let bars: Vec<(&str, f64)> = regional
            .iter()
            .filter_map(|r| Some((r.region.as_str(), r.mean_share?)))
            .collect();
        if bars.is_empty() {
            return Err("no regional share observations".into());
        }
        let (_, y1) = value_range(bars.iter().map(|b| b.1));

        let root = BitMapBackend::new(path, SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let labels: Vec<&str> = bars.iter().map(|b| b.0).collect();
        let mut chart = ChartBuilder::on(&root)
            .caption("Mean E-commerce Share by Region", (FONT, 30))
            .margin(15)
            .x_label_area_size(60)
            .y_label_area_size(60)
            .build_cartesian_2d((0..bars.len() as i32).into_segmented(), 0f64..y1)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(bars.len())
            .x_label_formatter(&|v| segment_label(v, &labels, 1))
            .y_desc("Mean share (%)")
            .draw()?;

        chart.draw_series(bars.iter().enumerate().map(|(i, &(_, v))| {
            let color = PALETTE[i % PALETTE.len()];
            let i = i as i32;
            Rectangle::new(
                [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), v)],
                color.filled(),
            )
        }))?;

        root.present()?;
        Ok(())
    }

    fn internet_vs_ecommerce(regional: &[RegionalRow], path: &Path) -> DrawResult<()> {
        if regional.is_empty() {
            return Err("no regions".into());
        }
        let labels: Vec<&str> = regional.iter().map(|r| r.region.as_str()).collect();
        let y1 = value_range(
            regional
                .iter()
                .flat_map(|r| [r.mean_internet, r.mean_share])
                .flatten(),
        )
        .1;

        let root = BitMapBackend::new(path, SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        // three segments per region: internet, share, gap
        let slots = regional.len() as i32 * 3;
        let mut chart = ChartBuilder::on(&root)
            .caption("Internet Penetration vs E-commerce Share", (FONT, 30))
            .margin(15)
            .x_label_area_size(60)
            .y_label_area_size(60)
            .build_cartesian_2d((0..slots).into_segmented(), 0f64..y1)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(slots as usize)
            .x_label_formatter(&|v| segment_label(v, &labels, 3))
            .y_desc("Percent")
            .draw()?;

        let bar = |slot: i32, value: f64, color: RGBColor| {
            Rectangle::new(
                [
                    (SegmentValue::Exact(slot), 0.0),
                    (SegmentValue::Exact(slot + 1), value),
                ],
                color.filled(),
            )
        };
        chart
            .draw_series(regional.iter().enumerate().filter_map(|(i, r)| {
                Some(bar(i as i32 * 3, r.mean_internet?, INTERNET_COLOR))
            }))?
            .label("Internet users (%)")
            .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], INTERNET_COLOR.filled()));
        chart
            .draw_series(regional.iter().enumerate().filter_map(|(i, r)| {
                Some(bar(i as i32 * 3 + 1, r.mean_share?, SHARE_COLOR))
            }))?
            .label("E-commerce share (%)")
            .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], SHARE_COLOR.filled()));

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
        root.present()?;
        Ok(())
    }

    fn period_boxplot(&self, rows: &[PanelRow], path: &Path) -> DrawResult<()> {
        let groups: Vec<(&str, Vec<f64>)> = periods(rows, self.config)
            .into_iter()
            .map(|p| {
                let values: Vec<f64> = rows
                    .iter()
                    .filter(|r| p.contains(r.year))
                    .filter_map(|r| r.ecom_share_pct)
                    .collect();
                (p.label, values)
            })
            .filter(|group| !group.1.is_empty())
            .collect();
        if groups.is_empty() {
            return Err("no share observations".into());
        }
        let (y0, y1) = value_range(groups.iter().flat_map(|g| g.1.iter().copied()));

        let root = BitMapBackend::new(path, SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let labels: Vec<&str> = groups.iter().map(|g| g.0).collect();
        let mut chart = ChartBuilder::on(&root)
            .caption("E-commerce Share Around the Pandemic", (FONT, 30))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(
                (0..groups.len() as i32).into_segmented(),
                y0 as f32..y1 as f32,
            )?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(groups.len())
            .x_label_formatter(&|v| segment_label(v, &labels, 1))
            .y_desc("Share of turnover (%)")
            .draw()?;

        chart.draw_series(groups.iter().enumerate().map(|(i, (_, values))| {
            let color = PALETTE[i % PALETTE.len()];
            let quartiles = Quartiles::new(values.as_slice());
            Boxplot::new_vertical(SegmentValue::CenterOf(i as i32), &quartiles)
                .width(60)
                .whisker_width(0.5)
                .style(color.stroke_width(2))
        }))?;

        root.present()?;
        Ok(())
    }

    fn region_detail(&self, rows: &[PanelRow], region: &str, path: &Path) -> DrawResult<()> {
        let members: Vec<&PanelRow> = rows
            .iter()
            .filter(|r| r.region.as_deref() == Some(region))
            .collect();
        let share = yearly_mean(members.iter().copied(), |r| r.ecom_share_pct);
        let internet = yearly_mean(members.iter().copied(), |r| r.internet_users_pct);

        let years: BTreeSet<i32> = share.iter().chain(&internet).map(|p| p.0).collect();
        let (Some(&first), Some(&last)) = (years.first(), years.last()) else {
            return Err(format!("no observations for {region}").into());
        };
        let (_, share_max) = value_range(share.iter().map(|p| p.1));

        let root = BitMapBackend::new(path, SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let x_range = (first - 1)..(last + 1);
        let mut chart = ChartBuilder::on(&root)
            .caption(format!("{region}: E-commerce and Internet"), (FONT, 30))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .right_y_label_area_size(60)
            .build_cartesian_2d(x_range.clone(), 0f64..share_max)?
            .set_secondary_coord(x_range, 0f64..100f64);
        chart
            .configure_mesh()
            .x_desc("Year")
            .y_desc("E-commerce share (%)")
            .draw()?;
        chart
            .configure_secondary_axes()
            .y_desc("Internet users (%)")
            .draw()?;

        chart
            .draw_series(LineSeries::new(
                share.iter().copied(),
                SHARE_COLOR.stroke_width(3),
            ))?
            .label("E-commerce share")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &SHARE_COLOR));
        chart
            .draw_secondary_series(LineSeries::new(
                internet.iter().copied(),
                INTERNET_COLOR.stroke_width(3),
            ))?
            .label("Internet users")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &INTERNET_COLOR));

        for marker in self.markers_between(first, last) {
            chart.draw_series(LineSeries::new(
                vec![(marker.year, 0.0), (marker.year, share_max)],
                CRISIS_COLOR.mix(0.6).stroke_width(2),
            ))?;
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
        root.present()?;
        Ok(())
    }
}

/// Mean of `value` per year, in year order, over years with at least one value.
fn yearly_mean<'r>(
    rows: impl Iterator<Item = &'r PanelRow>,
    value: impl Fn(&PanelRow) -> Option<f64>,
) -> Vec<(i32, f64)> {
    let mut by_year: BTreeMap<i32, Vec<Option<f64>>> = BTreeMap::new();
    for row in rows {
        by_year.entry(row.year).or_default().push(value(row));
    }
    by_year
        .into_iter()
        .filter_map(|(year, values)| Some((year, mean_of(values)?)))
        .collect()
}

/// Axis range covering `values` with some head room; never empty.
fn value_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    let lower = min.min(0.0);
    let pad = ((max - lower) * 0.1).max(1.0);
    (lower, max + pad)
}

/// Label of the segment carrying the category name; every `stride`-th
/// segment starts a new category.
fn segment_label(value: &SegmentValue<i32>, labels: &[&str], stride: i32) -> String {
    match value {
        SegmentValue::CenterOf(i) if i % stride == 0 => labels
            .get((i / stride) as usize)
            .map(|s| s.to_string())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn file_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}
