//! Address calculator: (section, row-within-group, group) to a cell address.

use crate::cell_ref::CellAddress;
use crate::error::{ReportError, Result};

use super::{
    ClinTable, FixedCell, FixedField, GroupLabel, LabelRow, ReportLayout, RowBlock, RowField,
    RowOrigin, Section, SectionId, SummaryBinding, TechnicianColumns,
};

impl RowOrigin {
    /// Starting row and capacity of group `group`.
    pub fn block(&self, group: usize) -> Option<RowBlock> {
        match *self {
            Self::Uniform {
                base,
                stride,
                capacity,
            } => {
                let group = u32::try_from(group).ok()?;
                let start = base.checked_add(group.checked_mul(stride)?)?;
                Some(RowBlock { start, capacity })
            }
            Self::Table(blocks) => blocks.get(group).copied(),
        }
    }

    /// Number of groups the origin can place, if bounded.
    pub fn group_limit(&self) -> Option<usize> {
        match self {
            Self::Uniform { .. } => None,
            Self::Table(blocks) => Some(blocks.len()),
        }
    }
}

impl Section {
    /// Capacity of group `group`, or `None` when the layout has no block for it.
    pub fn capacity(&self, group: usize) -> Option<u32> {
        self.rows.block(group).map(|b| b.capacity)
    }

    /// Check that `rows` records fit group `group`.
    pub fn check_capacity(&self, group: usize, group_name: &str, rows: usize) -> Result<()> {
        let capacity = self.capacity(group).unwrap_or(0);
        if usize::try_from(capacity).is_ok_and(|c| rows <= c) {
            Ok(())
        } else {
            Err(ReportError::Capacity {
                section: self.id.to_string(),
                group: group_name.to_string(),
                rows,
                capacity,
            })
        }
    }

    /// 1-based worksheet row of record `row` in group `group`.
    pub fn row_number(&self, row: u32, group: usize) -> Result<u32> {
        let block = self.rows.block(group).ok_or_else(|| ReportError::Capacity {
            section: self.id.to_string(),
            group: format!("#{}", group + 1),
            rows: 1,
            capacity: 0,
        })?;
        if row >= block.capacity {
            return Err(ReportError::Capacity {
                section: self.id.to_string(),
                group: format!("#{}", group + 1),
                rows: usize::try_from(row).unwrap_or(usize::MAX).saturating_add(1),
                capacity: block.capacity,
            });
        }
        Ok(block.start + row)
    }

    /// Address of an arbitrary column on the row of record `row` in group `group`.
    pub fn cell_at(&self, column: &str, row: u32, group: usize) -> Result<CellAddress> {
        CellAddress::from_excel(column, self.row_number(row, group)?)
    }

    /// Address of `field` for record `row` in group `group`.
    pub fn address(&self, field: RowField, row: u32, group: usize) -> Result<CellAddress> {
        let column = self.column(field).ok_or_else(|| {
            ReportError::Template(format!("{} section has no {field:?} column", self.id))
        })?;
        self.cell_at(column, row, group)
    }

    pub fn column(&self, field: RowField) -> Option<&'static str> {
        self.columns
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, column)| *column)
    }

    /// Where the group label of group `group` goes.
    pub fn label_address(&self, label: &GroupLabel, group: usize) -> Result<CellAddress> {
        let row = match label.row {
            LabelRow::Fixed(row) => row,
            LabelRow::BlockOffset(offset) => {
                let block = self.rows.block(group).ok_or_else(|| {
                    ReportError::Template(format!("no block for group #{}", group + 1))
                })?;
                block.start + offset
            }
        };
        CellAddress::from_excel(label.column, row)
    }

    /// Header cell of indicator column `offset` for group `group`.
    pub fn technician_header(
        &self,
        techs: &TechnicianColumns,
        offset: u32,
        group: usize,
    ) -> Result<CellAddress> {
        let start = self
            .rows
            .block(group)
            .map(|b| b.start)
            .ok_or_else(|| ReportError::Template(format!("no block for group #{}", group + 1)))?;
        let row = start.checked_sub(techs.header_rows_above).filter(|r| *r > 0).ok_or_else(|| {
            ReportError::Template(format!("technician header above row {start} is off the sheet"))
        })?;
        CellAddress::from_excel(techs.first_column, row)?.right(offset)
    }

    /// Indicator cell of technician `offset` on record `row` in group `group`.
    pub fn technician_cell(
        &self,
        techs: &TechnicianColumns,
        offset: u32,
        row: u32,
        group: usize,
    ) -> Result<CellAddress> {
        self.cell_at(techs.first_column, row, group)?.right(offset)
    }
}

impl ReportLayout {
    pub fn section(&self, id: SectionId) -> Result<&Section> {
        self.sections
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| ReportError::Template(format!("{} layout has no {id} section", self.kind)))
    }

    /// Address of `field` for record `row` of group `group` in section `id`.
    pub fn address(&self, id: SectionId, field: RowField, row: u32, group: usize) -> Result<CellAddress> {
        self.section(id)?.address(field, row, group)
    }

    /// Sheet and address of a fixed single-value field (its first cell when
    /// the layout repeats it).
    pub fn fixed_address(&self, field: FixedField) -> Result<(&'static str, CellAddress)> {
        let cell = self
            .fixed
            .iter()
            .find(|c| c.field == field)
            .ok_or_else(|| ReportError::Template(format!("{} layout has no {field:?} cell", self.kind)))?;
        Ok((cell.sheet, cell.address()?))
    }
}

impl FixedCell {
    pub fn address(&self) -> Result<CellAddress> {
        CellAddress::parse(self.cell)
    }
}

impl ClinTable {
    /// (name cell, value cell) for CLIN `index`.
    pub fn cells(&self, index: usize) -> Result<(CellAddress, CellAddress)> {
        let offset = u32::try_from(index)
            .ok()
            .filter(|i| *i < self.capacity)
            .ok_or_else(|| ReportError::Capacity {
                section: "clins".into(),
                group: self.sheet.into(),
                rows: index + 1,
                capacity: self.capacity,
            })?;
        let row = self.first_row + offset;
        Ok((
            CellAddress::from_excel(self.name_column, row)?,
            CellAddress::from_excel(self.value_column, row)?,
        ))
    }
}

impl SummaryBinding {
    /// Summary row fed by the sheet at `position`.
    pub fn target_row(&self, position: usize) -> Result<u32> {
        u32::try_from(position)
            .ok()
            .filter(|p| *p < self.positions && *p < self.base_row)
            .map(|p| self.base_row - p)
            .ok_or_else(|| {
                ReportError::Template(format!(
                    "{} summary has {} rows, sheet position {position} is past the end",
                    self.quantity, self.positions
                ))
            })
    }

    /// (summary cell, group-sheet source cell) pairs for the sheet at `position`.
    pub fn cells(&self, position: usize) -> Result<Vec<(CellAddress, CellAddress)>> {
        let row = self.target_row(position)?;
        let target = CellAddress::from_excel(self.first_column, row)?;
        let source = CellAddress::from_excel(self.source_first_column, self.source_row)?;
        (0..self.width)
            .map(|i| Ok((target.right(i)?, source.right(i)?)))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::layout::{layout_for, ReportKind, PRICING_SQUARE_FOOT, PROJECT_SUMMARY_SQUARE_FOOT};
    use crate::model::PricingModel;

    #[test]
    fn uniform_origin_uses_stride() {
        let section = PRICING_SQUARE_FOOT.section(SectionId::SurveyData).unwrap();
        assert_eq!(section.address(RowField::AddressUpper, 0, 0).unwrap().to_string(), "B4");
        assert_eq!(section.address(RowField::ObjectId, 2, 1).unwrap().to_string(), "X407");
        assert_eq!(section.row_number(399, 19).unwrap(), 4 + 19 * 401 + 399);
    }

    #[test]
    fn uniform_origin_rejects_rows_past_capacity() {
        let section = PRICING_SQUARE_FOOT.section(SectionId::SurveyData).unwrap();
        let err = section.row_number(400, 0).unwrap_err();
        assert!(matches!(err, ReportError::Capacity { capacity: 400, .. }));
        assert!(section.check_capacity(0, "g", 400).is_ok());
        assert!(section.check_capacity(0, "g", 401).is_err());
    }

    #[test]
    fn table_origin_uses_literal_blocks() {
        let section = PROJECT_SUMMARY_SQUARE_FOOT.section(SectionId::Production).unwrap();
        assert_eq!(section.row_number(0, 0).unwrap(), 22);
        assert_eq!(section.row_number(0, 10).unwrap(), 18);
        assert_eq!(section.capacity(9), Some(400));
        assert_eq!(section.capacity(10), Some(150));
        assert_eq!(section.capacity(20), None);
        assert!(section.row_number(150, 12).is_err());
        assert!(section.check_capacity(25, "late", 1).is_err());
    }

    #[test]
    fn label_rows() {
        let section = PRICING_SQUARE_FOOT.section(SectionId::SurveyData).unwrap();
        let label = section.label.unwrap();
        assert_eq!(section.label_address(&label, 0).unwrap().to_string(), "B404");
        assert_eq!(section.label_address(&label, 1).unwrap().to_string(), "B805");
    }

    #[test]
    fn fixed_addresses_are_constant() {
        let layout = layout_for(ReportKind::ProjectSummary, PricingModel::InchFoot);
        let (sheet, cell) = layout.fixed_address(FixedField::CustomerName).unwrap();
        assert_eq!((sheet, cell.to_string().as_str()), ("SUMMARY", "BE89"));
        assert!(layout.fixed_address(FixedField::TotalReplaceArea).is_err());
    }

    #[test]
    fn summary_rows_count_down_from_base() {
        for layout in crate::layout::all_layouts() {
            for binding in layout.summary_bindings {
                assert_eq!(binding.target_row(0).unwrap(), binding.base_row);
                assert_eq!(binding.target_row(1).unwrap(), binding.base_row - 1);
                let last = usize::try_from(binding.positions).unwrap() - 1;
                assert!(binding.target_row(last).is_ok());
                assert!(binding.target_row(last + 1).is_err());
            }
        }
    }

    #[test]
    fn project_summary_inch_foot_bindings() {
        let layout = layout_for(ReportKind::ProjectSummary, PricingModel::InchFoot);
        let curbs = &layout.summary_bindings[0];
        let cells = curbs.cells(0).unwrap();
        assert_eq!(cells.len(), 5);
        assert_eq!(cells[0].0.to_string(), "E49");
        assert_eq!(cells[0].1.to_string(), "O8");
        assert_eq!(cells[4].1.to_string(), "S8");

        let sidewalks = &layout.summary_bindings[1];
        let cells = sidewalks.cells(2).unwrap();
        assert_eq!(cells.len(), 37);
        assert_eq!(cells[0].0.to_string(), "A85");
        assert_eq!(cells[36].0.to_string(), "AK85");
        assert_eq!(cells[36].1.to_string(), "AY5");
    }

    #[test]
    fn technician_cells() {
        let layout = layout_for(ReportKind::ProjectSummary, PricingModel::InchFoot);
        let section = layout.section(SectionId::Production).unwrap();
        let techs = section.technicians.unwrap();
        assert_eq!(section.technician_header(&techs, 0, 0).unwrap().to_string(), "P21");
        assert_eq!(section.technician_cell(&techs, 2, 3, 0).unwrap().to_string(), "R25");
    }

    #[test]
    fn clin_table_cells() {
        let clins = PRICING_SQUARE_FOOT.clins.unwrap();
        let (name, value) = clins.cells(1).unwrap();
        assert_eq!((name.to_string(), value.to_string()), ("G14".to_string(), "H14".to_string()));
        assert!(clins.cells(usize::try_from(clins.capacity).unwrap()).is_err());
    }

    #[test]
    fn every_layout_resolves() {
        for layout in crate::layout::all_layouts() {
            for cell in layout.fixed {
                cell.address().unwrap();
            }
            for section in layout.sections {
                for (field, _) in section.columns {
                    section.address(*field, 0, 0).unwrap();
                }
            }
        }
    }
}
