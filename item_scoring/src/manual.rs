/*!

This is the long-form manual for `item_scoring` and `psychscore`.

## Input tables

Three tables make a batch. Column names are fixed; any other column of the
responses and participants tables is carried along to the long scored output.

### responses

| column             | content                                              |
|--------------------|------------------------------------------------------|
| `respondent_id`    | identifier of the respondent                         |
| `session_id`       | identifier of the session                            |
| `item_id`          | identifier of the item                               |
| `response`         | the answer, may be empty                             |
| `response_ts`      | when the answer was recorded                         |
| `response_time_ms` | how long the answer took, in milliseconds            |

### participants

`respondent_id`, `consent`, `cohort`, `started_at`. One row per respondent.

### items

`item_id`, `scale_id`, `key_correct`, `reverse_scored`, `time_limit_sec`,
`scale_min`, `scale_max`. One row per item.

## Cleaning

Every response gets exactly one flag:

- `unknown_item` the item is not in the catalog. These rows are kept for
  auditing and counted in the report.
- `duplicate_discarded` the respondent answered the same item again later.
  Attempts are ordered by `response_ts`, then session, answer and latency; the
  last one is kept. Responses without a timestamp are the oldest.
- `missing_response` the kept attempt is blank, or, for an item without a key,
  is not a number or falls outside the bounds of the item.
- `timed_out` the latency is above `time_limit_sec * 1000`. Responses without a
  latency are never timed out.
- `valid` everything else.

## Scoring

- Items with a key: 1 if the answer matches the key, 0 otherwise. Whitespace is
  trimmed and numbers compare by value. With `KeyMatching::CaseInsensitive`
  (the default) `b` matches `B`; with `KeyMatching::Trimmed` it does not.
- Items without a key: the numeric answer. Reverse-scored items become
  `min + max - answer` using the bounds of the item, or the bounds configured
  for its scale. A reverse-scored item without any bounds cannot be scored and
  is reported as a configuration error.

Only `valid` responses get a score.

## Statistics

- Item statistics count scored responses only. With fewer than two, the
  statistics are undefined with the reason `insufficient_responses`.
- Standard deviations and variances use `n - 1`.
- The item-total correlation of an item is its correlation with the sum of the
  other items of its scale.
- Cronbach's alpha needs at least two items that vary and two respondents.

Both the item-total correlation and alpha are computed on the same matrix,
built according to the missing data policy:

- `ListwiseDeletion` (default): only respondents who have a score for every
  item of the scale.
- `MeanImputation`: respondents with at least one score in the scale, gaps
  filled with the mean of the item.

## Respondent scores

The mean (default) or the sum of the scored items of each scale. A respondent
without any scored item in a scale has no score for it.

## Configuration

`psychscore` reads a JSON configuration file:

```text
{
  "outputSettings": { "runName": "October batch", "outputDirectory": "output" },
  "sources": {
    "responses":    { "provider": "csv", "filePath": "responses.csv" },
    "participants": { "provider": "csv", "filePath": "participants.csv" },
    "items":        { "provider": "xlsx", "filePath": "items.xlsx", "excelWorksheetName": "items" }
  },
  "dropColumns": ["email"],
  "filter": { "consentValue": "yes", "responsesFrom": "2025-10-01", "responsesTo": "2025-10-31" },
  "rules": {
    "missingDataPolicy": "listwise",
    "keyMatching": "caseInsensitive",
    "aggregation": "mean",
    "abortOnError": false,
    "requireTimeLimits": false,
    "scaleBounds": { "EXT": { "min": 1, "max": 5 } }
  }
}
```

File paths are relative to the configuration file. `dropColumns` removes the
named columns from all the input tables as soon as they are read.

 */
