//! GraphQL documents sent to the comic platform.
//!
//! Selections are limited to the fields the crawler maps into records.

pub const COMMENT_QUERY: &str = r"
query commentList($commentListInput: CommentListInput!) {
  commentList(commentListInput: $commentListInput) {
    isEnd
    totalCount
    commentList {
      commentUid
      userUid
      productId
      seriesId
      comment
      likeCount
      createDt
      isBest
      userThumbnailUrl
      userName
      emoticon {
        itemSubType
        resourceId
        itemId
        itemVer
      }
    }
  }
}
";

pub const EPISODE_QUERY: &str = r"
query contentHomeProductList($after: String, $seriesId: Long!, $sortType: String) {
  contentHomeProductList(seriesId: $seriesId, after: $after, sortType: $sortType) {
    totalCount
    pageInfo {
      hasNextPage
      endCursor
    }
    edges {
      cursor
      node {
        thumbnail
        single {
          productId
          title
        }
        eventLog {
          eventMeta {
            id
            name
            category
            subcategory
          }
        }
      }
    }
  }
}
";
