//! # pbix-vertipaq 使用案例
//!
//! 打开一个报表容器并打印其中的数据模型：
//!
//! 1. 加载容器（解包 + catalog 解析）
//! 2. 表与列统计
//! 3. 关系 / 度量值 / M 查询
//! 4. 预览每张表的前几行
//! 5. （可选）导出 JSON
//!
//! ```text
//! cargo run --example inspect -- report.pbix [out.json]
//! ```

use pbix_vertipaq::export::{self, ExportOptions};
use pbix_vertipaq::Model;

const PREVIEW_ROWS: usize = 5;

fn main() -> pbix_vertipaq::Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: inspect <file.pbix> [export.json]");
        std::process::exit(2);
    };
    let export_path = args.next();

    println!("═══════════════════════════════════════════════════════════");
    println!("   pbix-vertipaq 数据模型检视                               ");
    println!("═══════════════════════════════════════════════════════════\n");

    // =========================================================================
    // 1. 加载
    // =========================================================================
    println!("【1】打开 {path} ...");
    let model = Model::open(&path)?;
    println!("    model       = {:?}", model.info().name);
    println!("    streams     = {}", model.container().stream_count());
    println!("    tables      = {}", model.tables().len());
    println!("    size        = {} bytes\n", model.size());

    // =========================================================================
    // 2. 统计
    // =========================================================================
    println!("【2】表统计 ...");
    for t in model.table_statistics() {
        println!(
            "    {:<24} rows={:<10} columns={:<4} partitions={:<3} size={}",
            t.table_name, t.row_count, t.column_count, t.partition_count, t.total_size
        );
    }
    println!();
    println!("    列统计：");
    for s in model.statistics() {
        println!(
            "      {}[{}]  card={}  dict={}  hidx={}  data={}  segments={}",
            s.table_name, s.column_name, s.cardinality,
            s.dictionary, s.hash_index, s.data_size, s.segment_count
        );
    }
    println!();

    // =========================================================================
    // 3. 关系 / 公式
    // =========================================================================
    println!("【3】关系与公式 ...");
    for r in model.relationships() {
        println!(
            "    {}[{}] → {}[{}]  {}  {}{}",
            r.from_table_name, r.from_column_name, r.to_table_name, r.to_column_name,
            r.cardinality, r.cross_filtering_behavior,
            if r.is_active { "" } else { "  (inactive)" }
        );
    }
    for m in model.measures() {
        println!("    measure {}[{}] = {}", m.table_name, m.name, m.expression);
    }
    for q in model.query_expressions() {
        println!("    M {} / {}: {} chars", q.table_name, q.partition_name, q.expression.len());
    }
    println!();

    // =========================================================================
    // 4. 数据预览（各表并发解码）
    // =========================================================================
    println!("【4】数据预览（前 {PREVIEW_ROWS} 行）...");
    let names = model.table_names();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    for (name, result) in model.get_tables(&refs) {
        match result {
            Ok(table) => {
                println!("    ── {name} ({} rows) ──", table.row_count());
                println!("      {}", table.column_names().join(" | "));
                for row in table.rows().take(PREVIEW_ROWS) {
                    let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                    println!("      {}", cells.join(" | "));
                }
            }
            Err(e) => println!("    ── {name} ── ✗ {e}"),
        }
    }
    println!();

    // =========================================================================
    // 5. 导出
    // =========================================================================
    if let Some(out) = export_path {
        println!("【5】导出 JSON → {out} ...");
        export::export_json_to_file(&model, &out, &ExportOptions::default().with_table_data())?;
        println!("    ✓ OK\n");
    }

    Ok(())
}
