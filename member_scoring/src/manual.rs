/*!

This is the long-form manual for `member_scoring` and `scorecard`.

## Input formats

Two kinds of reports are read. Both can be Excel (`.xlsx`, `.xls`) or CSV
(`.csv`) files. No assumption is made about the first row: the reports usually
start with a block of metadata (who ran the report, when, with which parameters)
before the real table.

### Main report

One row per member. The table starts at the first row whose first cell is
`First Name`. The columns may come in any order, and missing columns count as 0:

| Column | Meaning |
|---|---|
| `First Name`, `Last Name` | member identity |
| `P`, `A`, `L`, `M`, `S` | present, absent, late, medical, substitute |
| `RGI`, `RGO` | referrals given inside / outside the chapter |
| `RRI`, `RRO` | referrals received inside / outside the chapter |
| `V` | visitors |
| `1-2-1` | one-to-one meetings |
| `TYFCB` | closed business value |
| `CEU` | training units |
| `T` | testimonials |

The reporting period is read from the metadata block: a cell `From:` followed on
the same row by a date, and a cell `To:` followed by a date. Dates are read as
`dd-mm-yyyy` first, then `mm-dd-yyyy` (with `-` or `/`, and 2-digit years).
When the dates cannot be read, the period is today, and all the per-week rates
are computed over a single week.

### Training report

One row per training attendance. The table starts at the first row with a
`First Name` cell anywhere in it, and must also have a `Last Name` column
(`Surname` is not recognized). Every row counts as one training event for the
member, and the events are added to the `CEU` of the main report. Names are
matched after trimming and ignoring case: `jane doe` matches `Jane Doe`, but
`Jon Smith` does not match `John Smith`.

## Scoring

| Metric | Based on | Points |
|---|---|---|
| Referrals | (RGI + RGO) per week | <0.5: 0, <0.75: 5, <1: 10, <1.2: 15, else 20 |
| Visitors | V per week | <0.1: 0, <0.25: 5, <0.5: 10, <0.75: 15, else 20 |
| Attendance | A | more than 2: 0, 2: 5, 1: 10, none: 15 |
| Training | CEU + training events | 0: 0, 1: 5, 2: 10, 3 or more: 15 |
| Testimonials | T per week | none: 0, <0.075: 5, else 10 |
| TYFCB | TYFCB | <500,000: 0, <1,000,000: 5, <2,000,000: 10, else 15 |
| On time | L | never late: 5, else 0 |

A value exactly on a threshold gets the higher band. The total is out of 100 and
is colored green (70 and above), amber (50 and above), red (30 and above) or grey.
Each metric is colored with the same bands, applied to its percentage of the
metric maximum.

## Periods and history

Each upload is stored under its reporting period. Uploading a report for a
period that is already stored replaces the members of that period. Rows named
`Total`, `BNI` or `Visitors` are ignored in the heatmap and in the rankings.
A member without a row in a period shows `-` for that period, not 0.

*/
